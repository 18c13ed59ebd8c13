use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::utils::error::Result;

/// G2CRM export file-name prefixes, used to peel metadata off file names.
const KNOWN_PREFIXES: &[&str] = &[
    "CustomSQL_",
    "AssetDamageDetail_",
    "AssetDamageHistory_",
    "AssetDepreciationDetail_",
    "AssetLifeLoss_",
    "AssetRaising_",
    "AssetStormDetail_",
    "CsvOutputs_",
    "DeploymentEvent_",
    "Event_",
    "FloodBarrierPSEDetail_",
    "Iteration_",
    "IterationSeason_",
    "IterationYear_",
    "MapOutputs_",
    "MessageFile_",
    "ModeledAreaStorm_",
    "ProtectiveSystemElementStorm_",
    "RemovedAssets_",
    "StormEvent_",
    "Tide_",
    "Timing_",
    "WaveCalculation_",
    "AssetMACorrespondence_",
    "Assets_",
    "AssetsAllStatistics_",
    "AssetsPVDamage_",
    "AssetsTimesRebuilt_",
    "BulkheadPSE_",
    "ClosurePSE_",
    "FloodBarrierPSE_",
    "FragilityFunction_",
    "FragilityFunctionValue_",
    "FunctionType_",
    "InterflowElement_",
    "LeveePSE_",
    "LeveePSEFailureRepair_",
    "LocalSeaLevelChange_",
    "Location_",
    "MA_",
    "MAStatistics_",
    "MAType_",
    "PSE_",
    "PSEStatistics_",
    "PSEType_",
    "PolderMA_",
    "PumpPSE_",
    "SpatialIndex_",
    "Statistics_",
    "Structures_",
    "TransitionPSE_",
    "TransitionPSEFailureRepair_",
    "UnprotectedMA_",
    "UplandMA_",
    "VolumeStageFunction_",
    "VolumeStageFunctionValue_",
    "WallPSE_",
    "WallPSEFailureRepair_",
    "WaterMA_",
    "WetlandMA_",
    "WorkingCalculations_",
    "DiscountedDamages_",
];

/// Alternatives are matched in this order, case-insensitively.
const KNOWN_ALTERNATIVES: &[&str] = &[
    "FWOP", "S0", "S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8", "S9", "NS", "FWP",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlcCurve {
    High,
    Intermediate,
    Low,
}

impl SlcCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlcCurve::High => "High",
            SlcCurve::Intermediate => "Intermediate",
            SlcCurve::Low => "Low",
        }
    }
}

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{8}-\d{6}").expect("valid regex"))
}

fn timestamp_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_\d{8}-\d{6}").expect("valid regex"))
}

/// Recursively collect files under `dir` with the given extension whose file
/// name contains every substring in `contains`.
pub fn paths_by_type(dir: &Path, extension: &str, contains: &[String]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_files(dir, extension, contains, &mut found)?;
    // 穩定的輸出順序
    found.sort();
    Ok(found)
}

fn collect_files(
    dir: &Path,
    extension: &str,
    contains: &[String],
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, extension, contains, found)?;
        } else {
            let matches_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
            if matches_ext {
                let name = file_name(&path);
                if contains.iter().all(|phrase| name.contains(phrase.as_str())) {
                    found.push(path);
                }
            }
        }
    }
    Ok(())
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// True if the file name already carries a `YYYYMMDD-HHMMSS` timestamp.
pub fn timestamp_in_name(name: &str) -> bool {
    timestamp_re().is_match(name)
}

pub fn strip_timestamp(name: &str) -> String {
    timestamp_suffix_re().replace_all(name, "").into_owned()
}

/// File name with directory, extension, and timestamp removed. Everything
/// after the first dot counts as extension, matching the G2CRM naming
/// convention where dots only appear before extensions.
pub fn strip_meta(path: &Path) -> String {
    let name = file_name(path);
    let stem = name.split('.').next().unwrap_or("");
    strip_timestamp(stem)
}

pub fn derive_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_data_file(path: &Path) -> bool {
    matches!(derive_extension(path).as_str(), "csv" | "sqlite")
}

/// Sea-level-change curve named in the file, e.g.
/// `IterationYear_Intermediate_MA01a_FWOP.csv`.
pub fn derive_slc(path: &Path) -> Option<SlcCurve> {
    let name = file_name(path);
    if name.contains("High_") {
        Some(SlcCurve::High)
    } else if name.contains("Low_") {
        Some(SlcCurve::Low)
    } else if name.contains("Intermediate_") {
        Some(SlcCurve::Intermediate)
    } else {
        None
    }
}

fn strip_known_parts(path: &Path) -> String {
    let mut working = file_name(path);
    if let Some(prefix) = derive_prefix(path) {
        working = working.replacen(&format!("{}_", prefix), "", 1);
    }
    if let Some(slc) = derive_slc(path) {
        working = working.replacen(&format!("{}_", slc.as_str()), "", 1);
    }
    working
}

/// Plan alternative encoded in the file name (FWOP, FWP, NS, S0..S9).
pub fn derive_alt(path: &Path) -> Option<String> {
    if !is_data_file(path) {
        return None;
    }
    let working = strip_known_parts(path).to_lowercase();
    KNOWN_ALTERNATIVES
        .iter()
        .find(|alt| working.contains(&alt.to_lowercase()))
        .map(|alt| alt.to_string())
}

/// G2CRM export prefix of the file name, without the trailing underscore.
pub fn derive_prefix(path: &Path) -> Option<&'static str> {
    let name = file_name(path);
    KNOWN_PREFIXES
        .iter()
        .find(|prefix| name.contains(*prefix))
        .map(|prefix| prefix.trim_end_matches('_'))
}

/// Model area code, e.g. `MA01a` out of
/// `IterationYear_Intermediate_MA01a__FWOP_INT.csv`. Separator typos
/// (doubled underscores, dashes, stray dots) are normalized first.
pub fn derive_ma_code(path: &Path) -> Option<String> {
    static SQUASH: OnceLock<Regex> = OnceLock::new();
    let squash = SQUASH.get_or_init(|| Regex::new(r"_{2,}").expect("valid regex"));

    let working = strip_known_parts(path).replace(['-', '.'], "_");
    let working = squash.replace_all(&working, "_");

    working
        .split('_')
        .find(|token| token.to_lowercase().contains("ma"))
        .map(|token| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_detection_and_strip() {
        assert!(timestamp_in_name("Assets_MA01_20210304-153000.csv"));
        assert!(!timestamp_in_name("Assets_MA01.csv"));
        assert_eq!(
            strip_timestamp("Assets_MA01_20210304-153000"),
            "Assets_MA01"
        );
    }

    #[test]
    fn test_strip_meta() {
        let path = Path::new("/runs/Assets_MA01_20210304-153000.csv");
        assert_eq!(strip_meta(path), "Assets_MA01");
    }

    #[test]
    fn test_derive_slc() {
        let path = Path::new("IterationYear_Intermediate_MA01a_FWOP.csv");
        assert_eq!(derive_slc(path), Some(SlcCurve::Intermediate));
        assert_eq!(derive_slc(Path::new("Assets_MA01.csv")), None);
    }

    #[test]
    fn test_derive_alt() {
        let path = Path::new("IterationYear_Intermediate_MA01a_fwop.csv");
        assert_eq!(derive_alt(path).as_deref(), Some("FWOP"));
        let path = Path::new("AssetDamageDetail_High_MA02_S3.csv");
        assert_eq!(derive_alt(path).as_deref(), Some("S3"));
        // Non-data files carry no metadata
        assert_eq!(derive_alt(Path::new("notes_FWOP.txt")), None);
    }

    #[test]
    fn test_derive_prefix() {
        let path = Path::new("AssetDamageDetail_High_MA02_S3.csv");
        assert_eq!(derive_prefix(path), Some("AssetDamageDetail"));
        assert_eq!(derive_prefix(Path::new("random.csv")), None);
    }

    #[test]
    fn test_derive_ma_code() {
        let path = Path::new("IterationYear_Intermediate_MA01a__FWOP_INT.csv");
        assert_eq!(derive_ma_code(path).as_deref(), Some("MA01a"));
        let path = Path::new("AssetRaising_High-MA02.S1.csv");
        assert_eq!(derive_ma_code(path).as_deref(), Some("MA02"));
        assert_eq!(derive_ma_code(Path::new("Tide_High_base.csv")), None);
    }

    #[test]
    fn test_paths_by_type_filters_extension_and_substrings() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("run1");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("AssetDamageDetail_FWOP.csv"), "a,b\n").unwrap();
        std::fs::write(sub.join("AssetDamageDetail_S1.csv"), "a,b\n").unwrap();
        std::fs::write(sub.join("AssetDamageDetail_FWOP.txt"), "x").unwrap();

        let found = paths_by_type(
            dir.path(),
            "csv",
            &["AssetDamageDetail".to_string(), "FWOP".to_string()],
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert!(file_name(&found[0]).contains("FWOP"));
    }
}
