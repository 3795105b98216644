//! In-memory card catalog
//!
//! Serves printing records from memory, e.g. a JSON export of catalog search
//! results. Image references may be registered as raw bytes or point to files
//! relative to the catalog file.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strsim::normalized_levenshtein;
use tracing::{debug, info};

use super::{sort_by_release, CardCatalog, CatalogError, PrintingRecord};

/// Minimum name similarity for a fuzzy hit
const FUZZY_THRESHOLD: f64 = 0.6;
/// Maximum number of autocomplete suggestions
const MAX_SUGGESTIONS: usize = 20;

/// Accepted catalog file layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Records(Vec<PrintingRecord>),
    List { data: Vec<PrintingRecord> },
}

/// Catalog over a fixed set of printing records
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    records: Arc<Vec<PrintingRecord>>,
    images: Arc<HashMap<String, Vec<u8>>>,
    base_dir: Option<PathBuf>,
    image_fetches: Arc<AtomicUsize>,
    name_lookups: Arc<AtomicUsize>,
}

impl MemoryCatalog {
    pub fn new(records: Vec<PrintingRecord>) -> Self {
        Self {
            records: Arc::new(records),
            ..Default::default()
        }
    }

    /// Load records from a JSON file (an array of records or a `{"data": [...]}` list)
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)
            .map_err(|e| CatalogError::Decode(format!("{}: {}", path.display(), e)))?;

        let records = match file {
            CatalogFile::Records(records) | CatalogFile::List { data: records } => records,
        };
        info!("Loaded {} printings from {:?}", records.len(), path);

        Ok(Self {
            records: Arc::new(records),
            base_dir: path.parent().map(Path::to_path_buf),
            ..Default::default()
        })
    }

    /// Register image bytes under a reference
    pub fn with_image_bytes(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.images).insert(reference.into(), bytes);
        self
    }

    pub fn records(&self) -> &[PrintingRecord] {
        &self.records
    }

    /// Number of image fetches served, across all forks
    pub fn image_fetch_count(&self) -> usize {
        self.image_fetches.load(Ordering::Relaxed)
    }

    /// Number of name lookups served, across all forks
    pub fn name_lookup_count(&self) -> usize {
        self.name_lookups.load(Ordering::Relaxed)
    }

    fn distinct_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for record in self.records.iter() {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&record.name)) {
                names.push(&record.name);
            }
        }
        names
    }

    /// Best matching card name: exact (case-insensitive), then prefix, then edit distance
    fn resolve_name(&self, query: &str) -> Option<&str> {
        let query = query.trim();
        let lowered = query.to_lowercase();
        let names = self.distinct_names();

        if let Some(name) = names.iter().copied().find(|n| n.eq_ignore_ascii_case(query)) {
            return Some(name);
        }
        if !lowered.is_empty() {
            if let Some(name) = names.iter().copied().find(|n| n.to_lowercase().starts_with(&lowered)) {
                return Some(name);
            }
        }

        names
            .iter()
            .map(|n| (*n, normalized_levenshtein(&n.to_lowercase(), &lowered)))
            .filter(|(_, score)| *score >= FUZZY_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n)
    }

    fn resolve_path(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl CardCatalog for MemoryCatalog {
    fn named_fuzzy(&self, name: &str) -> Result<PrintingRecord, CatalogError> {
        self.name_lookups.fetch_add(1, Ordering::Relaxed);
        let resolved = self
            .resolve_name(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;

        let mut prints: Vec<PrintingRecord> = self
            .records
            .iter()
            .filter(|r| r.name == resolved)
            .cloned()
            .collect();
        sort_by_release(&mut prints);
        prints
            .pop()
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    fn printings_of(&self, card: &PrintingRecord) -> Result<Vec<PrintingRecord>, CatalogError> {
        let mut prints: Vec<PrintingRecord> = self
            .records
            .iter()
            .filter(|r| match (&card.oracle_id, &r.oracle_id) {
                (Some(a), Some(b)) => a == b,
                _ => r.name.eq_ignore_ascii_case(&card.name),
            })
            .cloned()
            .collect();
        sort_by_release(&mut prints);
        debug!("Found {} printings of '{}'", prints.len(), card.name);
        Ok(prints)
    }

    fn by_set_and_number(&self, set_code: &str, number: &str) -> Result<PrintingRecord, CatalogError> {
        self.records
            .iter()
            .find(|r| r.set_code.eq_ignore_ascii_case(set_code) && r.collector_number == number)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("{}/{}", set_code, number)))
    }

    fn autocomplete(&self, partial: &str) -> Result<Vec<String>, CatalogError> {
        let lowered = partial.trim().to_lowercase();
        if lowered.is_empty() {
            return Ok(Vec::new());
        }

        let names = self.distinct_names();
        let prefix = names.iter().filter(|n| n.to_lowercase().starts_with(&lowered));
        let contains = names
            .iter()
            .filter(|n| !n.to_lowercase().starts_with(&lowered) && n.to_lowercase().contains(&lowered));

        Ok(prefix
            .chain(contains)
            .take(MAX_SUGGESTIONS)
            .map(|n| n.to_string())
            .collect())
    }

    fn fetch_image(&self, reference: &str) -> Result<Vec<u8>, CatalogError> {
        self.image_fetches.fetch_add(1, Ordering::Relaxed);

        if let Some(bytes) = self.images.get(reference) {
            return Ok(bytes.clone());
        }

        let path = self.resolve_path(reference);
        if !path.is_file() {
            return Err(CatalogError::NotFound(reference.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    fn fork(&self) -> Box<dyn CardCatalog> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            PrintingRecord::new("Lightning Bolt", "m10", "146").with_released_at("2009-07-17"),
            PrintingRecord::new("Lightning Bolt", "lea", "161").with_released_at("1993-08-05"),
            PrintingRecord::new("Sol Ring", "c21", "263").with_released_at("2021-04-23"),
            PrintingRecord::new("Soltari Priest", "tmp", "49").with_released_at("1997-10-14"),
        ])
    }

    #[test]
    fn test_named_fuzzy() {
        let catalog = catalog();
        assert_eq!(catalog.named_fuzzy("lightning bolt").unwrap().set_code, "m10");
        assert_eq!(catalog.named_fuzzy("Lightnig Bolt").unwrap().name, "Lightning Bolt");
        assert_eq!(catalog.named_fuzzy("Sol").unwrap().name, "Sol Ring");
        assert!(catalog.named_fuzzy("Black Lotus").unwrap_err().is_not_found());
    }

    #[test]
    fn test_printings_sorted_oldest_first() {
        let prints = catalog().printings("Lightning Bolt").unwrap();
        let sets: Vec<&str> = prints.iter().map(|p| p.set_code.as_str()).collect();
        assert_eq!(sets, vec!["lea", "m10"]);
    }

    #[test]
    fn test_printings_of_resolved_card_skips_name_lookup() {
        let catalog = catalog();
        let card = catalog.named_fuzzy("sol ring").unwrap();
        assert_eq!(catalog.name_lookup_count(), 1);

        let prints = catalog.printings_of(&card).unwrap();
        assert_eq!(prints.len(), 1);
        assert_eq!(catalog.name_lookup_count(), 1);

        catalog.printings("Sol Ring").unwrap();
        assert_eq!(catalog.name_lookup_count(), 2);
    }

    #[test]
    fn test_by_set_and_number() {
        let catalog = catalog();
        assert_eq!(catalog.by_set_and_number("C21", "263").unwrap().name, "Sol Ring");
        assert!(catalog.by_set_and_number("c21", "264").is_err());
    }

    #[test]
    fn test_autocomplete_prefix_first() {
        let suggestions = catalog().autocomplete("sol").unwrap();
        assert_eq!(suggestions, vec!["Sol Ring".to_string(), "Soltari Priest".to_string()]);
        assert!(catalog().autocomplete("  ").unwrap().is_empty());
    }

    #[test]
    fn test_fetch_image_counts_and_sources() {
        let dir = tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.json");
        std::fs::write(dir.path().join("bolt.png"), b"png-bytes").unwrap();
        std::fs::write(
            &catalog_path,
            r#"[{"name":"Lightning Bolt","set":"lea","collector_number":"161",
                 "image_uris":{"normal":"bolt.png"}}]"#,
        )
        .unwrap();

        let catalog = MemoryCatalog::from_json_file(&catalog_path)
            .unwrap()
            .with_image_bytes("mem://sol", vec![1, 2, 3]);

        assert_eq!(catalog.fetch_image("bolt.png").unwrap(), b"png-bytes");
        assert_eq!(catalog.fetch_image("mem://sol").unwrap(), vec![1, 2, 3]);
        assert!(catalog.fetch_image("missing.png").is_err());

        let forked = catalog.fork();
        forked.fetch_image("mem://sol").unwrap();
        assert_eq!(catalog.image_fetch_count(), 4);
    }

    #[test]
    fn test_from_json_list_layout() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"object":"list","data":[{{"name":"Sol Ring","set":"lea","collector_number":"270"}}]}}"#
        )
        .unwrap();

        let catalog = MemoryCatalog::from_json_file(file.path()).unwrap();
        assert_eq!(catalog.records().len(), 1);
    }

    #[test]
    fn test_from_json_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            MemoryCatalog::from_json_file(file.path()),
            Err(CatalogError::Decode(_))
        ));
    }
}
