//! Adapters for the external tools the pipeline drives.
//!
//! Each tool sits behind a trait so the controller can be exercised with
//! fakes; the real adapters shell out through [`command::run`].

pub mod command;
pub mod crypt;
pub mod dump;
pub mod inventory;
pub mod notify;
pub mod transfer;

#[cfg(test)]
pub mod fake;

use crate::config::Config;
use crypt::{Encryptor, GpgEncryptor};
use dump::{Dumper, Vzdump};
use inventory::{Inventory, ProxmoxInventory};
use notify::{MailNotifier, Notifier};
use transfer::{Rclone, RemoteStore};

/// Every collaborator a run needs.
pub struct Toolset {
    pub inventory: Box<dyn Inventory>,
    pub dumper: Box<dyn Dumper>,
    pub encryptor: Box<dyn Encryptor>,
    pub remote: Box<dyn RemoteStore>,
    /// `None` when no recipient is configured
    pub notifier: Option<Box<dyn Notifier>>,
}

impl Toolset {
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        Self {
            inventory: Box::new(ProxmoxInventory::new(&tools.qm, &tools.pct)),
            dumper: Box::new(Vzdump::new(&tools.vzdump, &config.dump.mode, &config.dump.compress)),
            encryptor: Box::new(GpgEncryptor::new(&tools.gpg)),
            remote: Box::new(Rclone::new(&tools.rclone)),
            notifier: config
                .notify
                .recipient
                .as_ref()
                .map(|to| Box::new(MailNotifier::new(&tools.mail, to)) as Box<dyn Notifier>),
        }
    }
}
