//! Pool enumeration
//!
//! Every subdirectory of the data root is a candidate instance. A failing
//! entry lands in the error list and the scan moves on, so one broken
//! instance never hides the rest of the inventory.
//!
//! The listing is live: a concurrent create or delete may or may not be
//! observed. Order is whatever the directory listing yields.

use std::fs;

use sharedvm_core::{Error, Instance};
use tracing::{error, info};

use crate::local::{LocalRepository, TARGET};

impl LocalRepository {
    /// Ids of every instance directory under the data root.
    ///
    /// If the data root cannot be listed the id list is empty and the error
    /// list holds that single failure.
    pub fn instance_ids(&self) -> (Vec<String>, Vec<Error>) {
        let root = self.data_dir();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => return (Vec::new(), vec![Error::io("list data directory", root, e)]),
        };

        let mut ids = Vec::new();
        let mut errors = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    errors.push(Error::io("list data directory", root, e));
                    continue;
                }
            };
            match entry.file_type() {
                Ok(t) if t.is_dir() => {
                    ids.push(entry.file_name().to_string_lossy().into_owned());
                }
                Ok(_) => {}
                Err(e) => errors.push(Error::io("stat instance directory", entry.path(), e)),
            }
        }
        (ids, errors)
    }

    /// Number of instance directories
    pub fn instance_count(&self) -> (usize, Vec<Error>) {
        let (ids, errors) = self.instance_ids();
        (ids.len(), errors)
    }

    /// Every readable instance, plus one error per unreadable entry.
    ///
    /// Failures are logged in both variants.
    pub fn all_instances(&self) -> (Vec<Instance>, Vec<Error>) {
        self.collect_instances(false)
    }

    /// [`all_instances`](Self::all_instances) that also logs the scan start,
    /// each found instance and the final count
    pub fn all_instances_verbose(&self) -> (Vec<Instance>, Vec<Error>) {
        self.collect_instances(true)
    }

    fn collect_instances(&self, verbose: bool) -> (Vec<Instance>, Vec<Error>) {
        if verbose {
            info!(
                target: TARGET,
                "Starting shared instance lookup in data directory: {}",
                self.data_dir().display()
            );
        }

        let (ids, mut errors) = self.instance_ids();
        for e in &errors {
            error!(target: TARGET, error = %e, "Error finding shared instances");
        }

        let mut instances = Vec::with_capacity(ids.len());
        for id in ids {
            match self.find_by_id(&id) {
                Ok(instance) => {
                    if verbose {
                        info!(target: TARGET, "Found shared instance: {}", instance.id);
                    }
                    instances.push(instance);
                }
                Err(e) => {
                    error!(
                        target: TARGET,
                        error = %e,
                        "Error getting instance details for instance ID: {}", id
                    );
                    errors.push(Error::Scan {
                        id,
                        source: Box::new(e),
                    });
                }
            }
        }

        if verbose {
            let noun = if instances.len() == 1 {
                "instance"
            } else {
                "instances"
            };
            info!(
                target: TARGET,
                "{} shared Redis {} found",
                instances.len(),
                noun
            );
        }

        (instances, errors)
    }
}
