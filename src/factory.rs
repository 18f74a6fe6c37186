use anyhow::bail;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use rfq_builtin_negotiators::{AcceptAll, HoldFirm, LinearConcession};
use rfq_negotiator_component::MessageGenerator;
use rfq_offer_utils::OfferConstraints;

use crate::catalog::SupplierProfile;
use crate::error::NegotiationError;
use crate::impasse::ImpasseConfig;

/// How many rounds each negotiation gets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoundCount {
    Fixed { count: u32 },
    /// Drawn from inclusive range. The same seed and supplier give
    /// always the same number of rounds.
    Seeded { min: u32, max: u32, seed: u64 },
}

impl Default for RoundCount {
    fn default() -> Self {
        RoundCount::Fixed { count: 4 }
    }
}

impl RoundCount {
    pub fn resolve(&self, supplier_id: &str) -> Result<u32, NegotiationError> {
        match *self {
            RoundCount::Fixed { count: 0 } => Err(NegotiationError::InvalidConfig(
                "rounds.count must be positive".to_string(),
            )),
            RoundCount::Fixed { count } => Ok(count),
            RoundCount::Seeded { min, max, .. } if min == 0 || min > max => {
                Err(NegotiationError::InvalidConfig(format!(
                    "rounds range [{}, {}] is invalid",
                    min, max
                )))
            }
            RoundCount::Seeded { min, max, seed } => {
                let mut rng = StdRng::seed_from_u64(seed ^ stable_hash(supplier_id));
                Ok(rng.gen_range(min..=max))
            }
        }
    }
}

/// FNV-1a. `DefaultHasher` output isn't guaranteed to be stable between releases.
fn stable_hash(text: &str) -> u64 {
    text.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

/// What happens, when one of the parties wants to end negotiations
/// or impasse is detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpassePolicy {
    /// Signals are logged and negotiation goes on until the last round.
    Continue,
    /// Negotiation ends with `impasse` status.
    Terminate,
}

impl Default for ImpassePolicy {
    fn default() -> Self {
        ImpassePolicy::Continue
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    pub rounds: RoundCount,
    pub impasse: ImpasseConfig,
    pub impasse_policy: ImpassePolicy,
    /// Discounts from reference price used, when negotiation ends without
    /// any Offer. Indexed by number of rounds.
    pub fallback_discounts: Vec<f64>,
    #[serde(with = "humantime_serde")]
    pub generation_timeout: Option<Duration>,
    /// Our limits. Violations are only reported.
    pub constraints: OfferConstraints,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        NegotiationConfig {
            rounds: RoundCount::default(),
            impasse: ImpasseConfig::default(),
            impasse_policy: ImpassePolicy::default(),
            fallback_discounts: vec![0.0, 0.03, 0.05, 0.08],
            generation_timeout: Some(Duration::from_secs(60)),
            constraints: OfferConstraints::default(),
        }
    }
}

impl NegotiationConfig {
    pub fn from_yaml(text: &str) -> Result<NegotiationConfig, NegotiationError> {
        let config: NegotiationConfig = serde_yaml::from_str(text)
            .map_err(|e| NegotiationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NegotiationError> {
        self.impasse.validate()?;
        if self.fallback_discounts.is_empty() {
            return Err(NegotiationError::InvalidConfig(
                "fallback_discounts can't be empty".to_string(),
            ));
        }
        if let Some(discount) = self
            .fallback_discounts
            .iter()
            .find(|discount| !(0.0..1.0).contains(*discount))
        {
            return Err(NegotiationError::InvalidConfig(format!(
                "fallback discount {} is outside of [0, 1) range",
                discount
            )));
        }
        self.rounds.resolve("").map(|_| ())
    }

    /// Discount for auto resolution after given number of rounds.
    pub fn fallback_discount(&self, rounds: u32) -> f64 {
        let idx = (rounds as usize).min(self.fallback_discounts.len().saturating_sub(1));
        self.fallback_discounts.get(idx).cloned().unwrap_or(0.0)
    }
}

/// Message generator selected by name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub name: String,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl GeneratorConfig {
    pub fn new(name: &str, params: serde_yaml::Value) -> GeneratorConfig {
        GeneratorConfig {
            name: name.to_string(),
            params,
        }
    }

    pub fn create(&self) -> anyhow::Result<Arc<dyn MessageGenerator>> {
        create_builtin(&self.name, self.params.clone())
    }
}

pub fn create_builtin(
    name: &str,
    config: serde_yaml::Value,
) -> anyhow::Result<Arc<dyn MessageGenerator>> {
    let generator = match name {
        "AcceptAll" => Arc::new(AcceptAll::new(config)?) as Arc<dyn MessageGenerator>,
        "LinearConcession" => {
            Arc::new(LinearConcession::new(config)?) as Arc<dyn MessageGenerator>
        }
        "HoldFirm" => Arc::new(HoldFirm::new(config)?) as Arc<dyn MessageGenerator>,
        _ => bail!("BuiltIn message generator {} doesn't exist.", name),
    };
    Ok(generator)
}

/// Everything, that single negotiation needs to know about its supplier.
/// Created fresh for every negotiation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    pub negotiation_id: String,
    pub supplier: SupplierProfile,
    pub max_rounds: u32,
}

pub fn create_collaborator(
    supplier_id: &str,
    profile: &SupplierProfile,
    config: &NegotiationConfig,
) -> Result<CollaboratorConfig, NegotiationError> {
    if profile.id != supplier_id {
        return Err(NegotiationError::InvalidConfig(format!(
            "Supplier profile [{}] doesn't match supplier [{}]",
            profile.id, supplier_id
        )));
    }

    Ok(CollaboratorConfig {
        negotiation_id: generate_id(),
        supplier: profile.clone(),
        max_rounds: config.rounds.resolve(supplier_id)?,
    })
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::supplier;
    use rfq_builtin_negotiators::concession;

    #[test]
    fn test_default_config_from_empty_yaml() {
        let config = NegotiationConfig::from_yaml("{}").unwrap();
        assert_eq!(config.rounds, RoundCount::Fixed { count: 4 });
        assert_eq!(config.impasse_policy, ImpassePolicy::Continue);
        assert_eq!(config.generation_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.fallback_discounts, vec![0.0, 0.03, 0.05, 0.08]);
    }

    #[test]
    fn test_config_from_yaml() {
        let config = NegotiationConfig::from_yaml(
            r#"
rounds:
  mode: seeded
  min: 3
  max: 4
  seed: 42
impasse:
  max_rounds: 6
impasse_policy: terminate
generation_timeout: 5s
constraints:
  max_price: 30.0
"#,
        )
        .unwrap();

        assert_eq!(config.impasse.max_rounds, 6);
        assert_eq!(config.impasse.progress_window_size, 3);
        assert_eq!(config.impasse_policy, ImpassePolicy::Terminate);
        assert_eq!(config.generation_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.constraints.max_price, Some(30.0));
    }

    #[test]
    fn test_invalid_config() {
        assert!(NegotiationConfig::from_yaml("rounds:\n  mode: fixed\n  count: 0\n").is_err());
        assert!(NegotiationConfig::from_yaml(
            "rounds:\n  mode: seeded\n  min: 5\n  max: 3\n  seed: 1\n"
        )
        .is_err());
        assert!(NegotiationConfig::from_yaml("fallback_discounts: [0.1, 1.5]\n").is_err());
        assert!(NegotiationConfig::from_yaml("fallback_discounts: []\n").is_err());
    }

    #[test]
    fn test_seeded_rounds_are_reproducible() {
        let rounds = RoundCount::Seeded {
            min: 3,
            max: 4,
            seed: 7,
        };

        for supplier in ["s1", "s2", "s3"] {
            let count = rounds.resolve(supplier).unwrap();
            assert!((3..=4).contains(&count));
            assert_eq!(rounds.resolve(supplier).unwrap(), count);
        }
    }

    #[test]
    fn test_fallback_discount_clamped() {
        let config = NegotiationConfig::default();
        assert_eq!(config.fallback_discount(0), 0.0);
        assert_eq!(config.fallback_discount(2), 0.05);
        assert_eq!(config.fallback_discount(10), 0.08);
    }

    #[test]
    fn test_create_builtin() {
        let params = serde_yaml::to_value(concession::Config {
            opening_price: Some(40.0),
            limit_price: Some(30.0),
            ..concession::Config::default()
        })
        .unwrap();

        assert!(create_builtin("LinearConcession", params).is_ok());
        assert!(GeneratorConfig::new("AcceptAll", serde_yaml::Value::Null)
            .create()
            .is_ok());
        assert!(create_builtin("Unknown", serde_yaml::Value::Null).is_err());
    }

    #[test]
    fn test_create_collaborator() {
        let profile = supplier("s1", 4.0, 1.0);
        let config = NegotiationConfig::default();

        let first = create_collaborator("s1", &profile, &config).unwrap();
        let second = create_collaborator("s1", &profile, &config).unwrap();

        assert_eq!(first.max_rounds, 4);
        assert_eq!(first.supplier, profile);
        assert_eq!(first.negotiation_id.len(), 16);
        assert_ne!(first.negotiation_id, second.negotiation_id);
        assert!(create_collaborator("s2", &profile, &config).is_err());
    }
}
