//! Model registry - the static catalog of forecasting model descriptors.
//!
//! The catalog is purely descriptive: nothing here knows how to predict.
//! Algorithm dispatch happens in the generator via `ModelKind::from_name`.

use crate::engine::error::{EngineError, Result};
use crate::engine::types::{Complexity, ModelCategory, ModelDescriptor, ParamValue};
use std::collections::HashMap;
use tracing::debug;

/// In-memory catalog of forecasting models, seeded once at initialization.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog with the built-in models. Idempotent: descriptors
    /// already present (by name) are left untouched, never duplicated.
    pub fn seed(&mut self) {
        for descriptor in default_catalog() {
            if self.models.iter().any(|m| m.name == descriptor.name) {
                continue;
            }
            self.models.push(descriptor);
        }
        debug!("Model registry seeded with {} models", self.models.len());
    }

    /// All registered models, in catalog order.
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Look up a model by id.
    pub fn get(&self, id: u32) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .ok_or(EngineError::UnknownModel(id))
    }

    /// Look up a model by its unique name.
    pub fn get_by_name(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.name == name)
    }
}

fn params(entries: &[(&str, ParamValue)]) -> HashMap<String, ParamValue> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// The built-in model catalog.
fn default_catalog() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor {
            id: 1,
            name: "linear-trend".to_string(),
            category: ModelCategory::Statistical,
            complexity: Complexity::Beginner,
            parameters: HashMap::new(),
            best_for: "Steadily growing or shrinking series with little noise".to_string(),
        },
        ModelDescriptor {
            id: 2,
            name: "moving-average".to_string(),
            category: ModelCategory::Statistical,
            complexity: Complexity::Beginner,
            parameters: params(&[("window", ParamValue::Number(3.0))]),
            best_for: "Flat or slowly drifting series with moderate noise".to_string(),
        },
        ModelDescriptor {
            id: 3,
            name: "exponential-smoothing".to_string(),
            category: ModelCategory::Statistical,
            complexity: Complexity::Intermediate,
            parameters: params(&[("alpha", ParamValue::Number(0.3))]),
            best_for: "Recent-history-dominated series".to_string(),
        },
        ModelDescriptor {
            id: 4,
            name: "autoregressive".to_string(),
            category: ModelCategory::Statistical,
            complexity: Complexity::Intermediate,
            parameters: params(&[("lag_weight", ParamValue::Number(0.7))]),
            best_for: "Long series that revert toward their mean".to_string(),
        },
        ModelDescriptor {
            id: 5,
            name: "polynomial-regression".to_string(),
            category: ModelCategory::MachineLearning,
            complexity: Complexity::Intermediate,
            parameters: params(&[("degree", ParamValue::Number(2.0))]),
            best_for: "Series with accelerating growth or decay".to_string(),
        },
        ModelDescriptor {
            id: 6,
            name: "seasonal-decomposition".to_string(),
            category: ModelCategory::MachineLearning,
            complexity: Complexity::Advanced,
            parameters: params(&[
                ("period", ParamValue::Number(12.0)),
                ("multiplicative", ParamValue::Bool(true)),
            ]),
            best_for: "Sales and revenue series with yearly seasonality".to_string(),
        },
        ModelDescriptor {
            id: 7,
            name: "ensemble-tree".to_string(),
            category: ModelCategory::MachineLearning,
            complexity: Complexity::Advanced,
            parameters: params(&[("trees", ParamValue::Number(5.0))]),
            best_for: "Volatile series where averaging tames variance".to_string(),
        },
        ModelDescriptor {
            id: 8,
            name: "neural-approximation".to_string(),
            category: ModelCategory::AiPowered,
            complexity: Complexity::Advanced,
            parameters: params(&[
                ("activation", ParamValue::Text("tanh".to_string())),
                ("period_term", ParamValue::Bool(true)),
            ]),
            best_for: "Long, nonlinear series that defy simple projections".to_string(),
        },
    ]
}
