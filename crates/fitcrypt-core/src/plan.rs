//! The statistics pipeline as data.
//!
//! Every homomorphic call the circuit makes is one [`Step`] over a small
//! register file. [`LevelBudget::validate`] walks the program over
//! `(scale, level, size)` metadata only, applying the same rules a provider
//! enforces, so a mis-ordered rescale or an unaligned add is caught when the
//! circuit is built rather than when a result fails to decrypt.
//!
//! Scale bookkeeping is bit-exact: every scale in the program is a power of
//! two times a power of the base scale, and the metadata walk performs the
//! same floating-point products and quotients the provider does.

use crate::error::{CoreError, CoreResult, HeError};
use crate::he::rotation_components;
use crate::masks::MaskPattern;
use crate::params::EncryptionParams;
use std::collections::HashMap;

/// Ciphertext registers used by the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    /// XY position frame (input)
    PosA,
    /// ZT position/time frame (input)
    PosB,
    /// Date and validity lanes (input)
    SummaryMask,
    /// Averaged motion channels (input)
    Gyro,
    Ml,
    MlTerms,
    Scratch,
    DiffA,
    DiffAHigh,
    DiffB,
    Stats,
    Summed,
    Elapsed,
    Buffer,
    Gate,
    Summary,
    MaskLow,
}

/// Which Galois key set a rotation uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySet {
    Generic,
    SingleStep,
}

/// Encoding scale of a plaintext operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlainScale {
    Base,
    Small,
    SmallSquared,
    BaseTimesSmall,
    /// Whatever scale the ciphertext operand currently has
    Operand,
}

impl PlainScale {
    pub fn resolve(&self, params: &EncryptionParams, operand: f64) -> f64 {
        match self {
            Self::Base => params.scale(),
            Self::Small => params.small_scale(),
            Self::SmallSquared => params.small_scale() * params.small_scale(),
            Self::BaseTimesSmall => params.scale() * params.small_scale(),
            Self::Operand => operand,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Copy { dst: Reg, src: Reg },
    /// `dst += src`
    Add { dst: Reg, src: Reg },
    /// `dst -= src`
    Sub { dst: Reg, src: Reg },
    /// `dst = src * mask`, mask encoded at `scale` and the operand's level
    MulPlain {
        dst: Reg,
        src: Reg,
        mask: MaskPattern,
        scale: PlainScale,
    },
    /// `dst += mask`
    AddPlain {
        dst: Reg,
        mask: MaskPattern,
        scale: PlainScale,
    },
    /// `dst *= src`
    Multiply { dst: Reg, src: Reg },
    Square { reg: Reg },
    Relinearize { reg: Reg },
    Rescale { reg: Reg },
    ModSwitch { reg: Reg },
    /// `dst = rotate(src, step)`
    Rotate {
        dst: Reg,
        src: Reg,
        step: usize,
        keys: KeySet,
    },
}

impl Op {
    /// Register whose value the step replaces
    pub fn target(&self) -> Reg {
        match *self {
            Op::Copy { dst, .. }
            | Op::Add { dst, .. }
            | Op::Sub { dst, .. }
            | Op::MulPlain { dst, .. }
            | Op::AddPlain { dst, .. }
            | Op::Multiply { dst, .. }
            | Op::Rotate { dst, .. } => dst,
            Op::Square { reg }
            | Op::Relinearize { reg }
            | Op::Rescale { reg }
            | Op::ModSwitch { reg } => reg,
        }
    }
}

/// Pipeline stage a step belongs to, for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MovementScore,
    DistanceDelta,
    DistanceTotal,
    Merge,
    Duration,
    Gate,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub stage: Stage,
    pub op: Op,
}

/// Tracked attributes of a ciphertext
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meta {
    pub scale: f64,
    pub level: usize,
    pub size: u8,
}

/// Metadata of the target register before and after one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepTrace {
    pub index: usize,
    pub op: Op,
    pub input: Option<Meta>,
    pub output: Meta,
}

/// Ordered program computing stats, summary and movement score
#[derive(Debug, Clone)]
pub struct StatsProgram {
    slot_count: usize,
    steps: Vec<Step>,
}

impl StatsProgram {
    pub const INPUTS: [Reg; 4] = [Reg::PosA, Reg::PosB, Reg::SummaryMask, Reg::Gyro];
    pub const STATS: Reg = Reg::Stats;
    pub const SUMMARY: Reg = Reg::Summary;
    pub const ML_SCORE: Reg = Reg::Ml;

    /// Build the program for `slot_count` lanes
    pub fn new(slot_count: usize) -> Self {
        use MaskPattern::*;
        use Op::*;
        use Reg::*;

        let n = slot_count;
        let h = n / 2;
        let mut steps = Vec::new();
        let mut stage = Stage::MovementScore;
        let mut push = |stage: Stage, op: Op| steps.push(Step { stage, op });

        // Weighted motion lanes folded into lane 0
        push(stage, MulPlain { dst: Ml, src: Gyro, mask: MovementWeights, scale: PlainScale::Base });
        push(stage, Copy { dst: MlTerms, src: Ml });
        for i in 1..MOVEMENT_LANES {
            push(stage, Rotate { dst: Scratch, src: MlTerms, step: i, keys: KeySet::Generic });
            push(stage, Add { dst: Ml, src: Scratch });
        }
        push(stage, MulPlain { dst: Ml, src: Ml, mask: Lane(0), scale: PlainScale::Base });

        // First differences; the wrapped boundary lanes are masked out
        stage = Stage::DistanceDelta;
        push(stage, Rotate { dst: DiffA, src: PosA, step: 1, keys: KeySet::SingleStep });
        push(stage, Sub { dst: DiffA, src: PosA });
        push(stage, Rotate { dst: DiffB, src: PosB, step: 1, keys: KeySet::SingleStep });
        push(stage, Sub { dst: DiffB, src: PosB });
        push(stage, MulPlain { dst: DiffAHigh, src: DiffA, mask: SecondHalfExceptLast, scale: PlainScale::Small });
        push(stage, MulPlain { dst: DiffA, src: DiffA, mask: FirstHalfExceptLast, scale: PlainScale::Small });
        push(stage, MulPlain { dst: DiffB, src: DiffB, mask: FirstHalfExceptLast, scale: PlainScale::Small });
        for reg in [DiffAHigh, DiffA, DiffB] {
            push(stage, Square { reg });
            push(stage, Relinearize { reg });
        }
        push(stage, Rotate { dst: Stats, src: DiffAHigh, step: h, keys: KeySet::Generic });
        push(stage, Add { dst: Stats, src: DiffA });
        push(stage, Add { dst: Stats, src: DiffB });

        // Running total in every lane
        stage = Stage::DistanceTotal;
        push(stage, Copy { dst: Summed, src: Stats });
        for i in power_steps(n) {
            push(stage, Rotate { dst: Scratch, src: Summed, step: i, keys: KeySet::Generic });
            push(stage, Add { dst: Summed, src: Scratch });
        }
        push(stage, Rescale { reg: Stats });
        push(stage, Rescale { reg: Summed });

        // Per-lane deltas in the first half, total in the second
        stage = Stage::Merge;
        push(stage, MulPlain { dst: Summed, src: Summed, mask: SecondHalf, scale: PlainScale::Small });
        push(stage, MulPlain { dst: Stats, src: Stats, mask: Ones, scale: PlainScale::Small });
        push(stage, Add { dst: Stats, src: Summed });
        push(stage, Copy { dst: Summary, src: Summed });

        // Last timestamp minus first, parked in lane h - 1
        stage = Stage::Duration;
        push(stage, MulPlain { dst: Elapsed, src: PosB, mask: Ones, scale: PlainScale::SmallSquared });
        push(stage, Rotate { dst: Buffer, src: Elapsed, step: h, keys: KeySet::Generic });
        push(stage, Rotate { dst: Elapsed, src: Buffer, step: h + 1, keys: KeySet::Generic });
        push(stage, Sub { dst: Buffer, src: Elapsed });
        push(stage, MulPlain { dst: Buffer, src: Buffer, mask: Lane(h.saturating_sub(1)), scale: PlainScale::BaseTimesSmall });
        push(stage, Rescale { reg: Buffer });
        push(stage, Add { dst: Stats, src: Buffer });

        // First half passes, second half follows the encrypted flag lanes
        stage = Stage::Gate;
        push(stage, MulPlain { dst: Gate, src: SummaryMask, mask: SecondHalf, scale: PlainScale::Small });
        push(stage, AddPlain { dst: Gate, mask: FirstHalf, scale: PlainScale::Operand });
        push(stage, Rescale { reg: Gate });
        push(stage, Multiply { dst: Stats, src: Gate });
        push(stage, Relinearize { reg: Stats });
        push(stage, Rescale { reg: Stats });

        // Duration across the first half, total across the second, picked by date lanes
        stage = Stage::Summary;
        for i in power_steps(h) {
            push(stage, Rotate { dst: Scratch, src: Buffer, step: i, keys: KeySet::Generic });
            push(stage, Add { dst: Buffer, src: Scratch });
        }
        push(stage, Add { dst: Summary, src: Buffer });
        push(stage, Copy { dst: MaskLow, src: SummaryMask });
        push(stage, ModSwitch { reg: MaskLow });
        push(stage, Multiply { dst: Summary, src: MaskLow });
        push(stage, Relinearize { reg: Summary });
        push(stage, Rescale { reg: Summary });

        Self { slot_count, steps }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Number of weighted motion lanes folded into lane 0
const MOVEMENT_LANES: usize = 6;

/// 1, 2, 4, ... strictly below `limit`
fn power_steps(limit: usize) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(1usize), |i| i.checked_mul(2)).take_while(move |i| *i < limit)
}

/// Static checker for a program against a parameter set and loaded key sets
pub struct LevelBudget<'a> {
    params: &'a EncryptionParams,
    generic_steps: &'a [usize],
    single_steps: &'a [usize],
}

impl<'a> LevelBudget<'a> {
    pub fn new(
        params: &'a EncryptionParams,
        generic_steps: &'a [usize],
        single_steps: &'a [usize],
    ) -> Self {
        Self {
            params,
            generic_steps,
            single_steps,
        }
    }

    /// Metadata of a fresh encryption
    pub fn fresh(&self) -> Meta {
        Meta {
            scale: self.params.scale(),
            level: self.params.top_level(),
            size: 2,
        }
    }

    /// Walk the program and return the target metadata after every step
    pub fn validate(&self, program: &StatsProgram) -> CoreResult<Vec<StepTrace>> {
        if program.slot_count() != self.params.slot_count() {
            return Err(CoreError::DimensionMismatch {
                expected: self.params.slot_count(),
                found: program.slot_count(),
            });
        }

        let mut regs: HashMap<Reg, Meta> = StatsProgram::INPUTS
            .iter()
            .map(|reg| (*reg, self.fresh()))
            .collect();

        let mut trace = Vec::with_capacity(program.steps().len());
        for (index, step) in program.steps().iter().enumerate() {
            let target = step.op.target();
            let input = regs.get(&target).copied();
            let output = self.apply(&regs, &step.op).map_err(|err| match err {
                Violation::Rotation(rotation) => CoreError::RotationKeyMissing { step: rotation },
                Violation::Rule(reason) => CoreError::Budget {
                    step: index,
                    reason: format!("{:?}: {reason}", step.op),
                },
            })?;
            regs.insert(target, output);
            trace.push(StepTrace {
                index,
                op: step.op,
                input,
                output,
            });
        }

        for out in [StatsProgram::STATS, StatsProgram::SUMMARY, StatsProgram::ML_SCORE] {
            let meta = regs.get(&out).ok_or_else(|| CoreError::Budget {
                step: trace.len(),
                reason: format!("output register {out:?} never written"),
            })?;
            if meta.size != 2 {
                return Err(CoreError::Budget {
                    step: trace.len(),
                    reason: format!("output register {out:?} left at size {}", meta.size),
                });
            }
        }

        Ok(trace)
    }

    fn apply(&self, regs: &HashMap<Reg, Meta>, op: &Op) -> Result<Meta, Violation> {
        let read = |reg: Reg| {
            regs.get(&reg)
                .copied()
                .ok_or_else(|| Violation::Rule(format!("register {reg:?} read before written")))
        };

        let out = match *op {
            Op::Copy { src, .. } => read(src)?,
            Op::Add { dst, src } | Op::Sub { dst, src } => {
                let (a, b) = (read(dst)?, read(src)?);
                same_level(a.level, b.level)?;
                same_scale(a.scale, b.scale)?;
                Meta {
                    size: a.size.max(b.size),
                    ..a
                }
            }
            Op::MulPlain { src, scale, .. } => {
                let a = read(src)?;
                let plain = scale.resolve(self.params, a.scale);
                self.params.check_scale(plain, a.level)?;
                let scale = a.scale * plain;
                self.params.check_scale(scale, a.level)?;
                Meta { scale, ..a }
            }
            Op::AddPlain { dst, scale, .. } => {
                let a = read(dst)?;
                same_scale(a.scale, scale.resolve(self.params, a.scale))?;
                a
            }
            Op::Multiply { dst, src } => self.product(read(dst)?, read(src)?)?,
            Op::Square { reg } => {
                let a = read(reg)?;
                self.product(a, a)?
            }
            Op::Relinearize { reg } => Meta {
                size: 2,
                ..read(reg)?
            },
            Op::Rescale { reg } => {
                let a = read(reg)?;
                let (scale, level) = self.params.rescaled(a.scale, a.level)?;
                if scale < 1.0 {
                    return Err(Violation::Rule(format!("rescale leaves scale {scale} below one")));
                }
                Meta { scale, level, ..a }
            }
            Op::ModSwitch { reg } => {
                let a = read(reg)?;
                if a.level == 0 {
                    return Err(HeError::LevelExhausted(0).into());
                }
                self.params.check_scale(a.scale, a.level - 1)?;
                Meta {
                    level: a.level - 1,
                    ..a
                }
            }
            Op::Rotate { src, step, keys, .. } => {
                let a = read(src)?;
                if a.size != 2 {
                    return Err(HeError::NotRelinearized(a.size).into());
                }
                let available = match keys {
                    KeySet::Generic => self.generic_steps,
                    KeySet::SingleStep => self.single_steps,
                };
                if rotation_components(step, self.params.slot_count())
                    .iter()
                    .any(|c| !available.contains(c))
                {
                    return Err(Violation::Rotation(step));
                }
                a
            }
        };
        Ok(out)
    }

    fn product(&self, a: Meta, b: Meta) -> Result<Meta, Violation> {
        if a.size != 2 || b.size != 2 {
            return Err(HeError::NotRelinearized(a.size.max(b.size)).into());
        }
        same_level(a.level, b.level)?;
        let scale = a.scale * b.scale;
        self.params.check_scale(scale, a.level)?;
        Ok(Meta {
            scale,
            level: a.level,
            size: 3,
        })
    }
}

enum Violation {
    Rule(String),
    Rotation(usize),
}

impl From<HeError> for Violation {
    fn from(err: HeError) -> Self {
        Violation::Rule(err.to_string())
    }
}

fn same_level(left: usize, right: usize) -> Result<(), Violation> {
    if left != right {
        return Err(HeError::LevelMismatch { left, right }.into());
    }
    Ok(())
}

#[allow(clippy::float_cmp)]
fn same_scale(left: f64, right: f64) -> Result<(), Violation> {
    if left != right {
        return Err(HeError::ScaleMismatch { left, right }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::he::{generic_rotation_steps, single_step_rotation_steps};

    fn budget_for(params: &EncryptionParams) -> (Vec<usize>, Vec<usize>) {
        (
            generic_rotation_steps(params.slot_count()),
            single_step_rotation_steps(),
        )
    }

    #[test]
    fn test_program_fits_the_chain() {
        for degree in [32, 1024, 8192] {
            let params = EncryptionParams::new(degree).unwrap();
            let (generic, single) = budget_for(&params);
            let program = StatsProgram::new(params.slot_count());
            let trace = LevelBudget::new(&params, &generic, &single)
                .validate(&program)
                .unwrap();
            assert_eq!(trace.len(), program.steps().len());
        }
    }

    #[test]
    fn test_outputs_land_on_level_one() {
        let params = EncryptionParams::new(64).unwrap();
        let (generic, single) = budget_for(&params);
        let program = StatsProgram::new(params.slot_count());
        let trace = LevelBudget::new(&params, &generic, &single)
            .validate(&program)
            .unwrap();

        let last = |reg: Reg| {
            trace
                .iter()
                .rev()
                .find(|t| t.op.target() == reg)
                .map(|t| t.output)
                .unwrap()
        };
        assert_eq!(last(Reg::Stats).level, 1);
        assert_eq!(last(Reg::Summary).level, 1);
        assert_eq!(last(Reg::Ml).level, params.top_level());
    }

    #[test]
    fn test_fold_uses_five_rotations() {
        let program = StatsProgram::new(32);
        let rotations = program
            .steps()
            .iter()
            .filter(|s| s.stage == Stage::MovementScore)
            .filter(|s| matches!(s.op, Op::Rotate { .. }))
            .count();
        assert_eq!(rotations, 5);
    }

    #[test]
    fn test_missing_generic_key_is_reported() {
        let params = EncryptionParams::new(64).unwrap();
        let generic = vec![1, 2, 4, 8];
        let single = single_step_rotation_steps();
        let err = LevelBudget::new(&params, &generic, &single)
            .validate(&StatsProgram::new(params.slot_count()))
            .unwrap_err();
        assert!(matches!(err, CoreError::RotationKeyMissing { step: 16 }));
    }

    #[test]
    fn test_dropping_a_rescale_breaks_the_budget() {
        let params = EncryptionParams::new(64).unwrap();
        let (generic, single) = budget_for(&params);
        let mut program = StatsProgram::new(params.slot_count());
        let pos = program
            .steps
            .iter()
            .position(|s| s.op == Op::Rescale { reg: Reg::Gate })
            .unwrap();
        program.steps.remove(pos);

        let err = LevelBudget::new(&params, &generic, &single)
            .validate(&program)
            .unwrap_err();
        assert!(matches!(err, CoreError::Budget { .. }));
    }

    #[test]
    fn test_rotating_unrelinearized_register_is_rejected() {
        let params = EncryptionParams::new(64).unwrap();
        let (generic, single) = budget_for(&params);
        let mut program = StatsProgram::new(params.slot_count());
        let pos = program
            .steps
            .iter()
            .position(|s| s.op == Op::Relinearize { reg: Reg::DiffAHigh })
            .unwrap();
        program.steps.remove(pos);

        let err = LevelBudget::new(&params, &generic, &single)
            .validate(&program)
            .unwrap_err();
        assert!(matches!(err, CoreError::Budget { .. }));
    }
}
