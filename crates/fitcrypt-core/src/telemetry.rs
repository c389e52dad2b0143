//! Packing one recorded run into the four circuit input frames

use crate::codec::ClientCodec;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Lane of the year-of-century one-hot block
pub const YEAR_OFFSET: usize = 0;
pub const DAY_OF_WEEK_OFFSET: usize = YEAR_OFFSET + 100;
pub const WEEK_OF_YEAR_OFFSET: usize = DAY_OF_WEEK_OFFSET + 7;
pub const DAY_OF_YEAR_OFFSET: usize = WEEK_OF_YEAR_OFFSET + 53;
pub const ELEVATION_GAIN_LANE: usize = DAY_OF_YEAR_OFFSET + 366;

/// Calendar position of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDate {
    pub year: u32,
    /// 0 = Sunday
    pub day_of_week: u32,
    /// 1-based
    pub week_of_year: u32,
    /// 1-based
    pub day_of_year: u32,
}

impl RunDate {
    fn validate(&self) -> CoreResult<()> {
        if self.day_of_week > 6
            || !(1..=53).contains(&self.week_of_year)
            || !(1..=366).contains(&self.day_of_year)
        {
            return Err(CoreError::InputLayout(format!("invalid run date {self:?}")));
        }
        Ok(())
    }

    /// One-hot lanes set for this date, relative to the start of a half
    pub fn lanes(&self) -> [usize; 4] {
        [
            YEAR_OFFSET + (self.year % 100) as usize,
            DAY_OF_WEEK_OFFSET + self.day_of_week as usize,
            WEEK_OF_YEAR_OFFSET + self.week_of_year as usize - 1,
            DAY_OF_YEAR_OFFSET + self.day_of_year as usize - 1,
        ]
    }
}

/// Raw samples of one run, positions already in cartesian coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecording {
    pub cartesian_x: Vec<f64>,
    pub cartesian_y: Vec<f64>,
    pub cartesian_z: Vec<f64>,
    /// Seconds
    pub timestamps: Vec<f64>,
    #[serde(default)]
    pub gyroscope: Vec<[f64; 3]>,
    #[serde(default)]
    pub accelerometer: Vec<[f64; 3]>,
    pub date: RunDate,
    #[serde(default)]
    pub elevation_gain: f64,
}

/// Plaintext circuit inputs, one vector per ciphertext
#[derive(Debug, Clone, PartialEq)]
pub struct RunFrames {
    /// x in the first half, y in the second
    pub position_xy: Vec<f64>,
    /// z in the first half, timestamps in the second
    pub position_zt: Vec<f64>,
    pub summary_mask: Vec<f64>,
    /// Mean gyroscope xyz then mean accelerometer xyz in lanes 0..6
    pub motion: Vec<f64>,
}

/// Armored circuit inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRun {
    pub position_xy: String,
    pub position_zt: String,
    pub summary_mask: String,
    pub motion: String,
}

impl RunRecording {
    pub fn pack(&self, slot_count: usize) -> CoreResult<RunFrames> {
        let half = slot_count / 2;
        let samples = self.timestamps.len();
        if samples == 0 {
            return Err(CoreError::InputLayout("run has no samples".into()));
        }
        for (name, len) in [
            ("cartesian_x", self.cartesian_x.len()),
            ("cartesian_y", self.cartesian_y.len()),
            ("cartesian_z", self.cartesian_z.len()),
        ] {
            if len != samples {
                return Err(CoreError::InputLayout(format!(
                    "{name} has {len} samples, timestamps has {samples}"
                )));
            }
        }
        if samples > half {
            return Err(CoreError::InputLayout(format!(
                "{samples} samples do not fit in {half} lanes"
            )));
        }
        if half <= ELEVATION_GAIN_LANE {
            return Err(CoreError::InputLayout(format!(
                "summary layout needs more than {} lanes per half, have {half}",
                ELEVATION_GAIN_LANE
            )));
        }
        self.date.validate()?;

        let position_xy = halves(&self.cartesian_x, &self.cartesian_y, half);
        let position_zt = halves(&self.cartesian_z, &self.timestamps, half);

        let mut summary_mask = vec![0.0; slot_count];
        for lane in self.date.lanes() {
            summary_mask[lane] = 1.0;
        }
        summary_mask[ELEVATION_GAIN_LANE] = self.elevation_gain;
        summary_mask.copy_within(0..half, half);

        let mut motion = vec![0.0; slot_count];
        motion[..3].copy_from_slice(&mean(&self.gyroscope));
        motion[3..6].copy_from_slice(&mean(&self.accelerometer));

        Ok(RunFrames {
            position_xy,
            position_zt,
            summary_mask,
            motion,
        })
    }
}

impl RunFrames {
    pub fn encrypt_to_wire(&self, codec: &ClientCodec<'_>) -> CoreResult<WireRun> {
        Ok(WireRun {
            position_xy: codec.encrypt_to_wire(&self.position_xy)?,
            position_zt: codec.encrypt_to_wire(&self.position_zt)?,
            summary_mask: codec.encrypt_to_wire(&self.summary_mask)?,
            motion: codec.encrypt_to_wire(&self.motion)?,
        })
    }
}

/// `low` then `high`, each padded with its last sample to `half` lanes
fn halves(low: &[f64], high: &[f64], half: usize) -> Vec<f64> {
    let pad = |values: &[f64]| {
        let last = values.last().copied().unwrap_or_default();
        values
            .iter()
            .copied()
            .chain(std::iter::repeat(last))
            .take(half)
            .collect::<Vec<_>>()
    };
    let mut out = pad(low);
    out.extend(pad(high));
    out
}

fn mean(samples: &[[f64; 3]]) -> [f64; 3] {
    if samples.is_empty() {
        return [0.0; 3];
    }
    let mut sum = [0.0; 3];
    for sample in samples {
        for (acc, v) in sum.iter_mut().zip(sample) {
            *acc += v;
        }
    }
    sum.map(|v| v / samples.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> RunRecording {
        RunRecording {
            cartesian_x: vec![0.0, 1.0, 2.0],
            cartesian_y: vec![5.0, 5.0, 6.0],
            cartesian_z: vec![1.0, 1.0, 1.0],
            timestamps: vec![100.0, 102.0, 104.0],
            gyroscope: vec![[1.0, 2.0, 3.0], [3.0, 4.0, 5.0]],
            accelerometer: vec![[0.0, 0.0, 9.0]],
            date: RunDate {
                year: 2026,
                day_of_week: 0,
                week_of_year: 43,
                day_of_year: 291,
            },
            elevation_gain: 12.5,
        }
    }

    #[test]
    fn test_positions_are_padded_with_last_sample() {
        let frames = recording().pack(2048).unwrap();
        assert_eq!(frames.position_xy[2], 2.0);
        assert_eq!(frames.position_xy[1023], 2.0);
        assert_eq!(frames.position_xy[1024], 5.0);
        assert_eq!(frames.position_xy[2047], 6.0);
        assert_eq!(frames.position_zt[1024], 100.0);
        assert_eq!(frames.position_zt[2047], 104.0);
    }

    #[test]
    fn test_summary_mask_is_mirrored() {
        let frames = recording().pack(2048).unwrap();
        let mask = &frames.summary_mask;
        for lane in [26, 100, 107 + 42, 160 + 290] {
            assert_eq!(mask[lane], 1.0);
            assert_eq!(mask[1024 + lane], 1.0);
        }
        assert_eq!(mask[ELEVATION_GAIN_LANE], 12.5);
        assert_eq!(mask[1024 + ELEVATION_GAIN_LANE], 12.5);
        assert_eq!(mask.iter().filter(|v| **v == 1.0).count(), 8);
    }

    #[test]
    fn test_motion_lanes_are_means() {
        let frames = recording().pack(2048).unwrap();
        assert_eq!(&frames.motion[..6], &[2.0, 3.0, 4.0, 0.0, 0.0, 9.0]);
        assert!(frames.motion[6..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_small_slot_count_cannot_hold_summary() {
        assert!(matches!(
            recording().pack(512),
            Err(CoreError::InputLayout(_))
        ));
    }

    #[test]
    fn test_ragged_samples_are_rejected() {
        let mut run = recording();
        run.cartesian_y.pop();
        assert!(run.pack(2048).is_err());
    }
}
