// 📄 CSV Export - one row per bout
//
// Column layout is fixed and matches what the browser version produced:
//
//   試合ID,試合日,試合種別,大会名,対戦相手,技の記録,先取,
//   自分反則カテゴリ1,自分反則カテゴリ2,相手反則カテゴリ1,相手反則カテゴリ2
//
// Techniques collapse into one cell ("中段突き2点自分、上段蹴り3点相手").

use crate::entities::{Actor, MatchRecord, PenaltyCategory};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CSV_HEADERS: [&str; 11] = [
    "試合ID",
    "試合日",
    "試合種別",
    "大会名",
    "対戦相手",
    "技の記録",
    "先取",
    "自分反則カテゴリ1",
    "自分反則カテゴリ2",
    "相手反則カテゴリ1",
    "相手反則カテゴリ2",
];

/// Separator between techniques inside the 技の記録 cell
pub const TECHNIQUE_SEPARATOR: &str = "、";

/// How fields containing commas, quotes or newlines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    /// RFC 4180 quoting, only where a field needs it
    #[default]
    Standard,
    /// Fields written verbatim, never quoted
    Legacy,
}

impl QuoteStyle {
    fn to_csv(self) -> csv::QuoteStyle {
        match self {
            QuoteStyle::Standard => csv::QuoteStyle::Necessary,
            QuoteStyle::Legacy => csv::QuoteStyle::Never,
        }
    }
}

pub fn techniques_cell(record: &MatchRecord) -> String {
    record
        .techniques
        .iter()
        .map(|t| t.summary())
        .collect::<Vec<_>>()
        .join(TECHNIQUE_SEPARATOR)
}

pub fn csv_row(record: &MatchRecord) -> [String; 11] {
    let count = |actor, category| record.penalty_count(actor, category).to_string();

    [
        record.id.clone(),
        record.date.to_string(),
        record.match_type.to_string(),
        record.tournament().to_string(),
        record.opponent().to_string(),
        techniques_cell(record),
        record.senshu.map(|a| a.to_string()).unwrap_or_default(),
        count(Actor::Me, PenaltyCategory::Category1),
        count(Actor::Me, PenaltyCategory::Category2),
        count(Actor::Opponent, PenaltyCategory::Category1),
        count(Actor::Opponent, PenaltyCategory::Category2),
    ]
}

/// Header plus one row per record, in input order
pub fn write_csv<W: Write>(writer: W, records: &[MatchRecord], style: QuoteStyle) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(style.to_csv())
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(CSV_HEADERS)
        .context("Failed to write CSV header")?;

    for record in records {
        wtr.write_record(csv_row(record))
            .with_context(|| format!("Failed to write CSV row for {}", record.id))?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn to_csv_string(records: &[MatchRecord], style: QuoteStyle) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, records, style)?;
    String::from_utf8(buf).context("CSV output was not valid UTF-8")
}

/// karate_records_2024-05-12.csv
pub fn export_filename(today: NaiveDate) -> String {
    format!("karate_records_{}.csv", today.format("%Y-%m-%d"))
}

/// Write the export into `dir` under the dated filename. Returns the path.
pub fn export_to_file(
    dir: &Path,
    records: &[MatchRecord],
    style: QuoteStyle,
    today: NaiveDate,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let path = dir.join(export_filename(today));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;

    write_csv(file, records, style)?;

    info!(path = %path.display(), rows = records.len(), "CSV exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        MatchType, PenaltyRecord, Point, TargetArea, TechniqueRecord, TechniqueType,
    };

    fn worked_example() -> MatchRecord {
        let date = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
        let technique = |actor, technique, area, point| TechniqueRecord {
            match_id: "m1".to_string(),
            date,
            match_type: MatchType::Practice,
            tournament_name: None,
            opponent_name: None,
            actor,
            technique,
            sub_technique: None,
            area,
            point,
        };

        MatchRecord {
            id: "m1".to_string(),
            date,
            match_type: MatchType::Practice,
            tournament_name: None,
            opponent_name: None,
            techniques: vec![
                technique(Actor::Me, TechniqueType::Tsuki, TargetArea::Chudan, Point::TWO),
                technique(Actor::Opponent, TechniqueType::Geri, TargetArea::Jodan, Point::THREE),
            ],
            penalties: vec![PenaltyRecord {
                match_id: "m1".to_string(),
                actor: Actor::Me,
                category: PenaltyCategory::Category1,
            }],
            senshu: Some(Actor::Me),
            colors_swapped: false,
        }
    }

    #[test]
    fn test_worked_example_row() {
        let record = worked_example();

        assert_eq!(techniques_cell(&record), "中段突き2点自分、上段蹴り3点相手");

        let csv = to_csv_string(&[record], QuoteStyle::Standard).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADERS.join(","));
        assert_eq!(
            lines[1],
            "m1,2024-05-12,練習,,,中段突き2点自分、上段蹴り3点相手,自分,1,0,0,0"
        );
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn test_empty_export_is_header_only() {
        let csv = to_csv_string(&[], QuoteStyle::Standard).unwrap();
        assert_eq!(csv, format!("{}\n", CSV_HEADERS.join(",")));
    }

    #[test]
    fn test_quote_styles_differ_only_on_special_characters() {
        let mut record = worked_example();
        record.tournament_name = Some("市民大会, 春".to_string());
        record.opponent_name = Some("Sato".to_string());

        let standard = to_csv_string(std::slice::from_ref(&record), QuoteStyle::Standard).unwrap();
        assert!(standard.contains(",\"市民大会, 春\",Sato,"));

        let legacy = to_csv_string(std::slice::from_ref(&record), QuoteStyle::Legacy).unwrap();
        assert!(legacy.contains(",市民大会, 春,Sato,"));

        // Ordinary rows are byte-identical in both styles
        let plain = [worked_example()];
        assert_eq!(
            to_csv_string(&plain, QuoteStyle::Standard).unwrap(),
            to_csv_string(&plain, QuoteStyle::Legacy).unwrap()
        );
    }

    #[test]
    fn test_rows_keep_input_order() {
        let mut second = worked_example();
        second.id = "m2".to_string();
        second.senshu = None;
        second.techniques.clear();

        let csv = to_csv_string(&[worked_example(), second], QuoteStyle::Standard).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[1].starts_with("m1,"));
        assert_eq!(lines[2], "m2,2024-05-12,練習,,,,,1,0,0,0");
    }

    #[test]
    fn test_export_filename_and_file() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
        assert_eq!(export_filename(today), "karate_records_2024-05-12.csv");

        let dir = std::env::temp_dir().join(format!("kumite-export-{}", uuid::Uuid::new_v4()));
        let path = export_to_file(&dir, &[worked_example()], QuoteStyle::Standard, today).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("中段突き2点自分"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
