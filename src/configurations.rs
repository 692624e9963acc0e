//! A module that contains functions required to read, parse and return the simulation settings
//! from the file `Config.toml` at the root of this crate. The algorithm itself reads no files;
//! these settings only shape the demo cluster and its message schedule.

use config::{Config, File};

/// The settings of one simulated cluster run.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub cluster: Cluster,
    pub schedule: Schedule,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Cluster {
    // How many nodes to run. Each node plays all three roles.
    pub nodes: usize,

    // How many of those nodes propose a value of their own.
    pub proposers: usize,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Schedule {
    // The seed of the random number generator which picks the delivery order, so that a run can
    // be replayed exactly.
    pub seed: u64,

    // The probability, per delivery, that the message is delivered a second time.
    pub duplicate_rate: f64,
}

impl Cluster {
    /// The majority threshold of this cluster.
    pub fn quorum_size(&self) -> usize {
        self.nodes / 2 + 1
    }
}

pub fn get_config(file_name: &str) -> Settings {
    let mut c = Config::default();
    c.merge(File::with_name(file_name)).expect("Could not read the configuration file");
    c.try_into::<Settings>().expect("Could not parse the configuration file")
}
