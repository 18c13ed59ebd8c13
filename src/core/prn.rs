use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Parse failures for `.prn` reports. Unfinished runs are not errors in the
/// summary output; they get their own sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrnParseError {
    Unfinished,
    MissingField(&'static str),
    InvalidValue { field: &'static str, value: String },
}

impl fmt::Display for PrnParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrnParseError::Unfinished => write!(f, "unfinished run"),
            PrnParseError::MissingField(field) => write!(f, "missing field '{}'", field),
            PrnParseError::InvalidValue { field, value } => {
                write!(f, "invalid value '{}' for field '{}'", value, field)
            }
        }
    }
}

impl std::error::Error for PrnParseError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatLine {
    pub mean: f64,
    pub std: f64,
}

/// Run metadata scraped from a G2CRM `.prn` report file.
#[derive(Debug, Clone, PartialEq)]
pub struct PrnReport {
    pub simulation_name: String,
    pub g2_version: String,
    pub g2_start_time: String,
    pub iterations: u32,
    pub seed: i64,
    pub slc: String,
    pub run_condition: String,
    pub interest_rate: f64,
    pub duration: f64,
    pub basis_time: String,
    pub start_time: String,
    pub slc_basis_year: i32,
    pub cum_damage_removal: bool,
    pub depreciation: bool,
    pub asset_raising: bool,
    pub calculate_life_loss: bool,
    pub run_time_secs: f64,
    pub plan_alt: String,
    pub asset_count: u32,
    pub storm_count: u32,
    pub total_life_loss: StatLine,
    pub upland_pv_damage: StatLine,
}

/// A finished report ends with the statistics block; reports with fewer
/// than seven blank lines were cut short mid-run.
const MIN_BLANK_LINES: usize = 7;

fn columns_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("valid regex"))
}

fn find_line<'a>(lines: &[&'a str], needle: &'static str) -> Result<&'a str, PrnParseError> {
    lines
        .iter()
        .find(|line| line.contains(needle))
        .copied()
        .ok_or(PrnParseError::MissingField(needle))
}

/// Everything after the first `": "` on the line.
fn value_after<'a>(line: &'a str, field: &'static str) -> Result<&'a str, PrnParseError> {
    line.splitn(2, ": ")
        .nth(1)
        .map(str::trim)
        .ok_or(PrnParseError::MissingField(field))
}

fn field_value<'a>(
    lines: &[&'a str],
    needle: &'static str,
) -> Result<&'a str, PrnParseError> {
    value_after(find_line(lines, needle)?, needle)
}

fn parse_numeric<T: std::str::FromStr>(
    value: &str,
    field: &'static str,
) -> Result<T, PrnParseError> {
    value
        .replace(',', "")
        .parse()
        .map_err(|_| PrnParseError::InvalidValue {
            field,
            value: value.to_string(),
        })
}

fn parse_bool(value: &str) -> bool {
    value == "True"
}

/// Statistics rows are fixed columns separated by runs of 2+ spaces, with
/// the mean in column 2 and the standard deviation in column 5.
fn parse_stat_line(lines: &[&str], needle: &'static str) -> Result<StatLine, PrnParseError> {
    let line = find_line(lines, needle)?;
    let columns: Vec<&str> = columns_re().split(line).collect();
    let column = |index: usize| -> Result<f64, PrnParseError> {
        let raw = columns.get(index).ok_or(PrnParseError::MissingField(needle))?;
        parse_numeric(raw, needle)
    };
    Ok(StatLine {
        mean: column(2)?,
        std: column(5)?,
    })
}

impl PrnReport {
    pub fn parse(text: &str) -> Result<Self, PrnParseError> {
        let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();

        let blank_lines = lines.iter().filter(|l| l.is_empty()).count();
        if blank_lines < MIN_BLANK_LINES {
            return Err(PrnParseError::Unfinished);
        }

        let run_line = find_line(&lines, "G2CRM Run on ")?;
        let g2_start_time = run_line
            .trim_start()
            .trim_start_matches("G2CRM Run on ")
            .split(" Model Version:")
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        let g2_version = value_after(find_line(&lines, "Model Version: ")?, "Model Version")?;

        let asset_count = {
            let index = lines
                .iter()
                .position(|line| line.trim() == "Assets:")
                .ok_or(PrnParseError::MissingField("Assets:"))?;
            let count_line = lines
                .get(index + 1)
                .ok_or(PrnParseError::MissingField("Assets:"))?;
            parse_numeric(value_after(count_line, "Assets:")?, "Assets:")?
        };

        Ok(PrnReport {
            simulation_name: field_value(&lines, "Simulation Name: ")?.to_string(),
            g2_version: g2_version.to_string(),
            g2_start_time,
            iterations: parse_numeric(
                field_value(&lines, "Number of Iterations: ")?,
                "Number of Iterations",
            )?,
            seed: parse_numeric(field_value(&lines, "Seed: ")?, "Seed")?,
            slc: field_value(&lines, "Sea Level Change: ")?.to_string(),
            run_condition: field_value(&lines, "RunConditions: ")?.to_string(),
            interest_rate: parse_numeric(
                field_value(&lines, "Interest Rate: ")?,
                "Interest Rate",
            )?,
            duration: parse_numeric(field_value(&lines, "Duration: ")?, "Duration")?,
            basis_time: field_value(&lines, "Basis Time: ")?.to_string(),
            start_time: field_value(&lines, "Start Time: ")?.to_string(),
            slc_basis_year: parse_numeric(
                field_value(&lines, "GlobalSLCBasisYear: ")?,
                "GlobalSLCBasisYear",
            )?,
            cum_damage_removal: parse_bool(field_value(
                &lines,
                "Do Cumulative Damage Removal: ",
            )?),
            depreciation: parse_bool(field_value(&lines, "Do Depreciation: ")?),
            asset_raising: parse_bool(field_value(&lines, "Do Asset Raising: ")?),
            calculate_life_loss: parse_bool(field_value(&lines, "Calculate Life Loss: ")?),
            run_time_secs: parse_numeric(
                field_value(&lines, "Computation Time: ")?
                    .split(" sec")
                    .next()
                    .unwrap_or_default(),
                "Computation Time",
            )?,
            plan_alt: field_value(&lines, "Plan Alternative: ")?.to_string(),
            asset_count,
            storm_count: parse_numeric(
                field_value(&lines, "Number of Distinct Storms:")?,
                "Number of Distinct Storms",
            )?,
            total_life_loss: parse_stat_line(&lines, "Total Life Loss")?,
            upland_pv_damage: parse_stat_line(&lines, "PV Damage")?,
        })
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_PRN: &str = "\
G2CRM Run on 06/07/2021 10:02:11 Model Version: 0.4.564.3
Simulation Name: FoxPoint_Int_MA01_FWOP

Run Parameters:
Number of Iterations: 100
Seed: 12345
Sea Level Change: Intermediate
RunConditions: FWOP
Interest Rate: 2.75
Duration: 50
Basis Time: 01JAN2030 00:00
Start Time: 01JAN2030 00:00
GlobalSLCBasisYear: 1992
Do Cumulative Damage Removal: True
Do Depreciation: False
Do Asset Raising: True
Calculate Life Loss: True
Plan Alternative: Without Project

Assets:
  Count: 250

Number of Distinct Storms: 22

Statistics:

  Total Life Loss  0.120  0.100  0.000  0.050
  Upland PV Damage  1,234,567.89  1,200,000.00  0.00  23,456.78

Computation Time: 3,600.5 sec

";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_report() {
        let report = PrnReport::parse(SAMPLE_PRN).unwrap();
        assert_eq!(report.simulation_name, "FoxPoint_Int_MA01_FWOP");
        assert_eq!(report.g2_version, "0.4.564.3");
        assert_eq!(report.g2_start_time, "06/07/2021 10:02:11");
        assert_eq!(report.iterations, 100);
        assert_eq!(report.seed, 12345);
        assert_eq!(report.slc, "Intermediate");
        assert_eq!(report.run_condition, "FWOP");
        assert_eq!(report.interest_rate, 2.75);
        assert_eq!(report.duration, 50.0);
        assert_eq!(report.slc_basis_year, 1992);
        assert!(report.cum_damage_removal);
        assert!(!report.depreciation);
        assert!(report.asset_raising);
        assert!(report.calculate_life_loss);
        assert_eq!(report.run_time_secs, 3600.5);
        assert_eq!(report.plan_alt, "Without Project");
        assert_eq!(report.asset_count, 250);
        assert_eq!(report.storm_count, 22);
        assert_eq!(report.total_life_loss, StatLine { mean: 0.12, std: 0.05 });
        assert_eq!(
            report.upland_pv_damage,
            StatLine {
                mean: 1_234_567.89,
                std: 23_456.78
            }
        );
    }

    #[test]
    fn test_unfinished_run_detected_by_blank_lines() {
        let truncated = "G2CRM Run on 06/07/2021 10:02:11 Model Version: 0.4.564.3\n\
                         Simulation Name: FoxPoint\n\n";
        assert_eq!(PrnReport::parse(truncated), Err(PrnParseError::Unfinished));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let text = SAMPLE_PRN.replace("Seed: 12345\n", "");
        match PrnReport::parse(&text) {
            Err(PrnParseError::MissingField(field)) => assert_eq!(field, "Seed: "),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
