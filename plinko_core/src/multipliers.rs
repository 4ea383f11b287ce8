//! Public multiplier tables and their theoretical return to player.

use serde::{Deserialize, Serialize};

use crate::error::{FairError, FairResult};

pub const MIN_ROWS: u8 = 8;
pub const MAX_ROWS: u8 = 16;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level `{other}`")),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// Left halves of the standard tables, edge bucket first, centre bucket last.
// The right half mirrors these.
const LOW: [&[f64]; 9] = [
    &[5.6, 2.1, 1.1, 1.0, 0.5],
    &[5.6, 2.0, 1.6, 1.0, 0.7],
    &[8.9, 3.0, 1.4, 1.1, 1.0, 0.5],
    &[8.4, 3.0, 1.9, 1.3, 1.0, 0.7],
    &[10.0, 3.0, 1.6, 1.4, 1.1, 1.0, 0.5],
    &[8.1, 4.0, 3.0, 1.9, 1.2, 0.9, 0.7],
    &[7.1, 4.0, 1.9, 1.4, 1.3, 1.1, 1.0, 0.5],
    &[15.0, 8.0, 3.0, 2.0, 1.5, 1.1, 1.0, 0.7],
    &[16.0, 9.0, 2.0, 1.4, 1.4, 1.2, 1.1, 1.0, 0.5],
];

const MEDIUM: [&[f64]; 9] = [
    &[13.0, 3.0, 1.3, 0.7, 0.4],
    &[18.0, 4.0, 1.7, 0.9, 0.5],
    &[22.0, 5.0, 2.0, 1.4, 0.6, 0.4],
    &[24.0, 6.0, 3.0, 1.8, 0.7, 0.5],
    &[33.0, 11.0, 4.0, 2.0, 1.1, 0.6, 0.3],
    &[43.0, 13.0, 6.0, 3.0, 1.3, 0.7, 0.4],
    &[58.0, 15.0, 7.0, 4.0, 1.9, 1.0, 0.5, 0.2],
    &[88.0, 18.0, 11.0, 5.0, 3.0, 1.3, 0.5, 0.3],
    &[110.0, 41.0, 10.0, 5.0, 3.0, 1.5, 1.0, 0.5, 0.3],
];

const HIGH: [&[f64]; 9] = [
    &[29.0, 4.0, 1.5, 0.3, 0.2],
    &[43.0, 7.0, 2.0, 0.6, 0.2],
    &[76.0, 10.0, 3.0, 0.9, 0.3, 0.2],
    &[120.0, 14.0, 5.2, 1.4, 0.4, 0.2],
    &[170.0, 24.0, 8.1, 2.0, 0.7, 0.2, 0.2],
    &[260.0, 37.0, 11.0, 4.0, 1.0, 0.2, 0.2],
    &[420.0, 56.0, 18.0, 5.0, 1.9, 0.3, 0.2, 0.2],
    &[620.0, 83.0, 27.0, 8.0, 3.0, 0.5, 0.2, 0.2],
    &[1000.0, 130.0, 26.0, 9.0, 4.0, 2.0, 0.2, 0.2, 0.2],
];

/// Terminal bucket index to payout multiplier, for one published board
/// configuration. Only the standard tables can be built, so any outcome
/// computed from a table can be re-audited from `(rows, risk)` alone.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MultiplierTable {
    rows: u8,
    risk: RiskLevel,
    multipliers: Vec<f64>,
}

pub fn validate_rows(rows: u8) -> FairResult<()> {
    if (MIN_ROWS..=MAX_ROWS).contains(&rows) {
        Ok(())
    } else {
        Err(FairError::InvalidRows(rows))
    }
}

impl MultiplierTable {
    /// The published table for `rows` and `risk`.
    pub fn standard(rows: u8, risk: RiskLevel) -> FairResult<Self> {
        validate_rows(rows)?;
        let halves = match risk {
            RiskLevel::Low => &LOW,
            RiskLevel::Medium => &MEDIUM,
            RiskLevel::High => &HIGH,
        };
        let half = halves[(rows - MIN_ROWS) as usize];
        let len = rows as usize + 1;
        let multipliers = (0..len)
            .map(|i| half[i.min(len - 1 - i)])
            .collect();
        Ok(Self {
            rows,
            risk,
            multipliers,
        })
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk
    }

    /// Edge to edge, `rows + 1` entries.
    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    pub fn get(&self, bucket: usize) -> Option<f64> {
        self.multipliers.get(bucket).copied()
    }

    pub fn is_symmetric(&self) -> bool {
        self.multipliers.iter().eq(self.multipliers.iter().rev())
    }

    /// Theoretical return to player for this table.
    pub fn rtp(&self) -> f64 {
        expected_value(&self.multipliers, self.rows)
    }

    pub fn house_edge(&self) -> f64 {
        1.0 - self.rtp()
    }
}

/// C(n, k) / 2^n: probability that a fair n-row drop lands in bucket k.
pub fn bucket_probability(rows: u8, bucket: usize) -> f64 {
    let n = rows as usize;
    if bucket > n {
        return 0.0;
    }
    let k = bucket.min(n - bucket);
    let mut c = 1.0f64;
    for i in 0..k {
        c = c * (n - i) as f64 / (i + 1) as f64;
    }
    c / 2f64.powi(rows as i32)
}

/// Σ multiplier[i] · P(bucket = i) under the binomial landing distribution.
/// Entries past `rows` carry no probability mass.
pub fn expected_value(multipliers: &[f64], rows: u8) -> f64 {
    multipliers
        .iter()
        .enumerate()
        .map(|(i, m)| m * bucket_probability(rows, i))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tables_are_symmetric_with_house_edge() {
        for risk in RiskLevel::ALL {
            for rows in MIN_ROWS..=MAX_ROWS {
                let table = MultiplierTable::standard(rows, risk).unwrap();
                assert_eq!(table.rows(), rows);
                assert_eq!(table.risk(), risk);
                assert_eq!(table.multipliers().len(), rows as usize + 1);
                assert!(table.is_symmetric());
                for i in 0..=rows as usize {
                    assert_eq!(table.get(i), table.get(rows as usize - i));
                }
                let rtp = table.rtp();
                assert!(rtp < 1.0, "{risk} {rows} rtp {rtp}");
                assert!(rtp > 0.98, "{risk} {rows} rtp {rtp}");
            }
        }
    }

    #[test]
    fn sixteen_row_low_table() {
        let table = MultiplierTable::standard(16, RiskLevel::Low).unwrap();
        assert_eq!(
            table.multipliers(),
            &[
                16.0, 9.0, 2.0, 1.4, 1.4, 1.2, 1.1, 1.0, 0.5, 1.0, 1.1, 1.2, 1.4, 1.4, 2.0, 9.0,
                16.0
            ]
        );
    }

    #[test]
    fn probabilities_sum_to_one() {
        for rows in 1..=16u8 {
            let total: f64 = (0..=rows as usize)
                .map(|b| bucket_probability(rows, b))
                .sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
        assert_eq!(bucket_probability(8, 4), 70.0 / 256.0);
    }

    #[test]
    fn rejects_unsupported_rows() {
        assert_eq!(
            MultiplierTable::standard(0, RiskLevel::Low),
            Err(FairError::InvalidRows(0))
        );
        assert!(MultiplierTable::standard(7, RiskLevel::High).is_err());
        assert!(MultiplierTable::standard(17, RiskLevel::High).is_err());
    }

    #[test]
    fn expected_value_of_arbitrary_multipliers() {
        assert!((expected_value(&[1.0; 5], 4) - 1.0).abs() < 1e-12);
        assert!((expected_value(&[2.0, 0.5, 2.0], 2) - 1.25).abs() < 1e-12);
    }
}
