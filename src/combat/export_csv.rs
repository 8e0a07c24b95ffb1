//! CSV export of a resolution's damage log, one row per phase event.

use serde::Serialize;

use crate::combat::engine::DamageEvent;

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    round: u32,
    source: &'a str,
    target: &'a str,
    raw_damage: f64,
    applied_damage: u32,
    hit: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Flush(String),
    #[error("csv output is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub fn events_to_csv(events: &[DamageEvent]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for event in events {
        writer.serialize(EventRow {
            round: event.round,
            source: &event.source_id,
            target: &event.target_id,
            raw_damage: (event.raw_damage * 100.0).round() / 100.0,
            applied_damage: event.applied_damage,
            hit: event.hit,
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_one_row_per_event() {
        let events = vec![
            DamageEvent {
                round: 1,
                source_id: "antibodies".to_string(),
                target_id: "pathogens".to_string(),
                raw_damage: 41.234,
                applied_damage: 36,
                hit: true,
            },
            DamageEvent {
                round: 1,
                source_id: "pathogens".to_string(),
                target_id: "antibodies".to_string(),
                raw_damage: 0.0,
                applied_damage: 0,
                hit: false,
            },
        ];
        let csv = events_to_csv(&events).expect("export should succeed");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "round,source,target,raw_damage,applied_damage,hit");
        assert_eq!(lines[1], "1,antibodies,pathogens,41.23,36,true");
        assert_eq!(lines[2], "1,pathogens,antibodies,0.0,0,false");
        assert_eq!(lines.len(), 3);
    }
}
