pub mod lesson_files;

use anyhow::Result;

use crate::dictionary::Blacklist;

/// Persistence seam for the blacklist. The lesson saves through this on
/// every change; tests substitute a recorder.
pub trait BlacklistStore {
    fn save(&self, blacklist: &Blacklist) -> Result<()>;
}
