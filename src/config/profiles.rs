use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EvaluationError;

/// Regressors deployed behind the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// CatBoost regressor; the service's default model.
    #[serde(rename = "CBR")]
    Cbr,
    Bayesian,
    ElasticNet,
    Huber,
    Lasso,
    LassoLars,
    Ridge,
    #[serde(rename = "XGB")]
    Xgb,
}

impl ModelKind {
    pub fn all() -> [ModelKind; 8] {
        [
            ModelKind::Cbr,
            ModelKind::Bayesian,
            ModelKind::ElasticNet,
            ModelKind::Huber,
            ModelKind::Lasso,
            ModelKind::LassoLars,
            ModelKind::Ridge,
            ModelKind::Xgb,
        ]
    }

    /// Name the prediction service expects in the `model` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Cbr => "CBR",
            ModelKind::Bayesian => "Bayesian",
            ModelKind::ElasticNet => "ElasticNet",
            ModelKind::Huber => "Huber",
            ModelKind::Lasso => "Lasso",
            ModelKind::LassoLars => "LassoLars",
            ModelKind::Ridge => "Ridge",
            ModelKind::Xgb => "XGB",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::all()
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = ModelKind::all().iter().map(|k| k.as_str()).collect();
                EvaluationError::InvalidArgument(format!(
                    "unknown model '{}', expected one of {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Selects which deployed model variant answers a prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSelection {
    pub model: Option<ModelKind>,
    pub version: Option<String>,
    pub alias: Option<String>,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            model: Some(ModelKind::Cbr),
            version: None,
            alias: None,
        }
    }
}

impl ModelSelection {
    /// Version and alias with blank values dropped, since the service
    /// treats an empty selector as a lookup for an unnamed variant.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}
