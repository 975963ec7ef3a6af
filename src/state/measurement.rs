use chrono::NaiveDateTime;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const RAW_COLUMN: &str = "ADC_Raw_Value";
pub const DERIVED_COLUMN: &str = "Current_A";

/// Header row of every capture file, in column order.
pub const CSV_HEADER: [&str; 3] = [TIMESTAMP_COLUMN, RAW_COLUMN, DERIVED_COLUMN];

/// Fractional digits written for the current column.
pub const DERIVED_DECIMALS: usize = 6;

/// One captured reading. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub timestamp: NaiveDateTime,
    /// Quantized ADC count as reported by the device.
    pub raw_value: i64,
    /// Current in amperes, converted on the device.
    pub derived_value: f64,
}

impl Measurement {
    pub fn new(timestamp: NaiveDateTime, raw_value: i64, derived_value: f64) -> Self {
        Self {
            timestamp,
            raw_value,
            derived_value,
        }
    }

    /// The three CSV cells for this record.
    pub fn to_row(&self) -> [String; 3] {
        [
            crate::data::datetime::format_record_timestamp(self.timestamp),
            self.raw_value.to_string(),
            format!("{:.*}", DERIVED_DECIMALS, self.derived_value),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_row_format() {
        let ts = NaiveDate::from_ymd_opt(2025, 7, 13)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let m = Measurement::new(ts, -1500, 0.0012345678);
        assert_eq!(
            m.to_row(),
            [
                "2025-07-13T12:00:00.000000".to_string(),
                "-1500".to_string(),
                "0.001235".to_string(),
            ]
        );
    }
}
