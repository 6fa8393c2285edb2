use std::sync::Arc;

use aidmap_crypto::FieldCipher;
use aidmap_db::Database;

use crate::reports::ReportService;
use crate::requests::RequestService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub cipher: FieldCipher,
}

impl AppStateInner {
    pub fn new(db: Database, cipher: FieldCipher) -> AppState {
        Arc::new(Self { db, cipher })
    }

    pub fn requests(&self) -> RequestService<'_> {
        RequestService::new(&self.db, &self.cipher)
    }

    pub fn reports(&self) -> ReportService<'_> {
        ReportService::new(&self.db)
    }
}
