use crate::{Epoch, ForkName, Slot};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Each of the BLS signature domains.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Domain {
    BeaconProposer,
    BeaconAttester,
}

/// Holds all the "constants" for a BeaconChain.
///
/// The preset values (`slots_per_epoch`, `epochs_per_historical_vector`, ...) are carried at
/// runtime so that a single binary can serve both the mainnet and minimal presets.
#[derive(PartialEq, Debug, Clone)]
pub struct ChainSpec {
    /*
     * Config name
     */
    pub config_name: Option<String>,

    /*
     * Constants
     */
    pub genesis_slot: Slot,
    pub far_future_epoch: Epoch,

    /*
     * Misc
     */
    pub max_committees_per_slot: usize,
    pub target_committee_size: usize,
    pub min_per_epoch_churn_limit: u64,
    pub max_per_epoch_activation_churn_limit: u64,
    pub churn_limit_quotient: u64,
    pub shuffle_round_count: u8,

    /*
     *  Gwei values
     */
    pub max_effective_balance: u64,

    /*
     * Time parameters
     */
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
    pub min_seed_lookahead: Epoch,
    pub max_seed_lookahead: Epoch,
    pub min_validator_withdrawability_delay: Epoch,
    pub epochs_per_historical_vector: u64,

    /*
     * Signature domains
     */
    pub domain_beacon_proposer: u32,
    pub domain_beacon_attester: u32,

    /*
     * Fork schedule
     */
    pub altair_fork_epoch: Option<Epoch>,
    pub bellatrix_fork_epoch: Option<Epoch>,
    pub capella_fork_epoch: Option<Epoch>,
    pub deneb_fork_epoch: Option<Epoch>,
}

impl ChainSpec {
    /// Returns the name of the fork which is active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        let enabled = |fork_epoch: Option<Epoch>| fork_epoch.is_some_and(|e| epoch >= e);

        if enabled(self.deneb_fork_epoch) {
            ForkName::Deneb
        } else if enabled(self.capella_fork_epoch) {
            ForkName::Capella
        } else if enabled(self.bellatrix_fork_epoch) {
            ForkName::Bellatrix
        } else if enabled(self.altair_fork_epoch) {
            ForkName::Altair
        } else {
            ForkName::Base
        }
    }

    /// Returns the name of the fork which is active at `slot`.
    pub fn fork_name_at_slot(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(self.slots_per_epoch))
    }

    /// Get the domain number, unmodified by the fork.
    pub fn get_domain_constant(&self, domain: Domain) -> u32 {
        match domain {
            Domain::BeaconProposer => self.domain_beacon_proposer,
            Domain::BeaconAttester => self.domain_beacon_attester,
        }
    }

    /// Returns the domain type bytes used as the prefix of a seed preimage.
    pub fn domain_type(&self, domain: Domain) -> [u8; 4] {
        self.get_domain_constant(domain).to_le_bytes()
    }

    /// Returns the epoch at which a validator queued in `epoch` will be activated or exited.
    ///
    /// Saturates at `far_future_epoch`.
    pub fn compute_activation_exit_epoch(&self, epoch: Epoch) -> Epoch {
        epoch
            .safe_add(1u64)
            .and_then(|e| e.safe_add(self.max_seed_lookahead))
            .unwrap_or(self.far_future_epoch)
    }

    /// Returns a `ChainSpec` compatible with the Ethereum Foundation specification.
    pub fn mainnet() -> Self {
        Self {
            /*
             * Config name
             */
            config_name: Some("mainnet".to_string()),

            /*
             * Constants
             */
            genesis_slot: Slot::new(0),
            far_future_epoch: Epoch::new(u64::MAX),

            /*
             * Misc
             */
            max_committees_per_slot: 64,
            target_committee_size: 128,
            min_per_epoch_churn_limit: 4,
            max_per_epoch_activation_churn_limit: 8,
            churn_limit_quotient: 65_536,
            shuffle_round_count: 90,

            /*
             *  Gwei values
             */
            max_effective_balance: 32_000_000_000,

            /*
             * Time parameters
             */
            seconds_per_slot: 12,
            slots_per_epoch: 32,
            min_seed_lookahead: Epoch::new(1),
            max_seed_lookahead: Epoch::new(4),
            min_validator_withdrawability_delay: Epoch::new(256),
            epochs_per_historical_vector: 65_536,

            /*
             * Signature domains
             */
            domain_beacon_proposer: 0,
            domain_beacon_attester: 1,

            /*
             * Fork schedule
             */
            altair_fork_epoch: Some(Epoch::new(74_240)),
            bellatrix_fork_epoch: Some(Epoch::new(144_896)),
            capella_fork_epoch: Some(Epoch::new(194_048)),
            deneb_fork_epoch: Some(Epoch::new(269_568)),
        }
    }

    /// Ethereum Foundation minimal spec, as defined in the consensus-specs repo.
    pub fn minimal() -> Self {
        Self {
            config_name: Some("minimal".to_string()),
            max_committees_per_slot: 4,
            target_committee_size: 4,
            min_per_epoch_churn_limit: 2,
            max_per_epoch_activation_churn_limit: 4,
            churn_limit_quotient: 32,
            shuffle_round_count: 10,
            seconds_per_slot: 6,
            slots_per_epoch: 8,
            epochs_per_historical_vector: 64,
            altair_fork_epoch: None,
            bellatrix_fork_epoch: None,
            capella_fork_epoch: None,
            deneb_fork_epoch: None,
            ..ChainSpec::mainnet()
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Chain configuration as read from a consensus-specs style YAML file.
///
/// Every field is optional; absent fields keep the value from the base `ChainSpec` passed to
/// `apply_to_chain_spec`. Unknown keys are ignored so that full upstream config files can be
/// loaded as-is.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "UPPERCASE")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_per_slot: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots_per_epoch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_seed_lookahead: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_seed_lookahead: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_validator_withdrawability_delay: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_committee_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_committees_per_slot: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle_round_count: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_per_epoch_churn_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_epoch_activation_churn_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub churn_limit_quotient: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_effective_balance: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altair_fork_epoch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bellatrix_fork_epoch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capella_fork_epoch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deneb_fork_epoch: Option<u64>,
}

impl Config {
    pub fn from_file(filename: &Path) -> Result<Self, String> {
        let f = File::open(filename)
            .map_err(|e| format!("Error opening spec at {}: {:?}", filename.display(), e))?;
        serde_yaml::from_reader(f)
            .map_err(|e| format!("Error parsing spec at {}: {:?}", filename.display(), e))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Error parsing spec: {:?}", e))
    }

    /// Returns the base `ChainSpec` named by `PRESET_BASE`, defaulting to mainnet.
    pub fn base_spec(&self) -> Result<ChainSpec, String> {
        match self.preset_base.as_deref() {
            None | Some("mainnet") => Ok(ChainSpec::mainnet()),
            Some("minimal") => Ok(ChainSpec::minimal()),
            Some(other) => Err(format!("Unknown preset base: {}", other)),
        }
    }

    /// Overwrite the fields of `chain_spec` which are present in `self`.
    pub fn apply_to_chain_spec(&self, chain_spec: &ChainSpec) -> ChainSpec {
        let mut spec = chain_spec.clone();

        // A fork epoch equal to `u64::MAX` means the fork is not scheduled.
        let fork_epoch = |value: Option<u64>, existing: Option<Epoch>| match value {
            Some(u64::MAX) => None,
            Some(epoch) => Some(Epoch::new(epoch)),
            None => existing,
        };

        if let Some(name) = &self.config_name {
            spec.config_name = Some(name.clone());
        }
        if let Some(v) = self.seconds_per_slot {
            spec.seconds_per_slot = v;
        }
        if let Some(v) = self.slots_per_epoch {
            spec.slots_per_epoch = v;
        }
        if let Some(v) = self.min_seed_lookahead {
            spec.min_seed_lookahead = Epoch::new(v);
        }
        if let Some(v) = self.max_seed_lookahead {
            spec.max_seed_lookahead = Epoch::new(v);
        }
        if let Some(v) = self.min_validator_withdrawability_delay {
            spec.min_validator_withdrawability_delay = Epoch::new(v);
        }
        if let Some(v) = self.target_committee_size {
            spec.target_committee_size = v;
        }
        if let Some(v) = self.max_committees_per_slot {
            spec.max_committees_per_slot = v;
        }
        if let Some(v) = self.shuffle_round_count {
            spec.shuffle_round_count = v;
        }
        if let Some(v) = self.min_per_epoch_churn_limit {
            spec.min_per_epoch_churn_limit = v;
        }
        if let Some(v) = self.max_per_epoch_activation_churn_limit {
            spec.max_per_epoch_activation_churn_limit = v;
        }
        if let Some(v) = self.churn_limit_quotient {
            spec.churn_limit_quotient = v;
        }
        if let Some(v) = self.max_effective_balance {
            spec.max_effective_balance = v;
        }

        spec.altair_fork_epoch = fork_epoch(self.altair_fork_epoch, spec.altair_fork_epoch);
        spec.bellatrix_fork_epoch =
            fork_epoch(self.bellatrix_fork_epoch, spec.bellatrix_fork_epoch);
        spec.capella_fork_epoch = fork_epoch(self.capella_fork_epoch, spec.capella_fork_epoch);
        spec.deneb_fork_epoch = fork_epoch(self.deneb_fork_epoch, spec.deneb_fork_epoch);

        spec
    }

    /// Loads the file at `filename` and applies it to the preset it names.
    pub fn load_chain_spec(filename: &Path) -> Result<ChainSpec, String> {
        let config = Self::from_file(filename)?;
        Ok(config.apply_to_chain_spec(&config.base_spec()?))
    }
}
