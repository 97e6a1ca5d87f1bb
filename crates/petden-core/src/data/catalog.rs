use serde::Serialize;

use crate::error::{PetError, Result};
use crate::models::PetKind;

/// One assignable pet archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Choice key used by callers, e.g. `pet1`.
    pub choice: String,
    pub kind: PetKind,
    pub photo: String,
}

/// The fixed set of pets a user can pick from, loaded from pets.csv.
#[derive(Debug, Clone)]
pub struct PetCatalog {
    entries: Vec<CatalogEntry>,
}

impl PetCatalog {
    /// Load from CSV bytes (choice,kind,photo per line, no header).
    pub fn from_csv_bytes(data: &[u8]) -> Result<Self> {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(data);

        for result in rdr.records() {
            let record = result?;
            if record.len() < 3 {
                continue;
            }
            let choice = record[0].trim().to_string();
            if choice.is_empty() {
                continue;
            }
            let kind = PetKind::parse(record[1].trim()).ok_or_else(|| {
                PetError::Data(format!("Unknown pet kind '{}' for '{}'", record[1].trim(), choice))
            })?;
            if entries.iter().any(|e| e.choice == choice) {
                return Err(PetError::Data(format!("Duplicate catalog choice '{}'", choice)));
            }
            entries.push(CatalogEntry {
                choice,
                kind,
                photo: record[2].trim().to_string(),
            });
        }

        log::info!("Loaded {} catalog pets", entries.len());
        Ok(Self { entries })
    }

    /// Load from the bundled pets.csv (compiled into the binary).
    pub fn bundled() -> Result<Self> {
        Self::from_csv_bytes(include_bytes!("../../data/pets.csv"))
    }

    pub fn get(&self, choice: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.choice == choice)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
