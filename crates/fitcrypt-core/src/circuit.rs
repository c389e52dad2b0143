//! Server-side statistics over encrypted telemetry.
//!
//! The circuit only ever holds evaluation keys. Both published operations
//! check their inputs before the first homomorphic call, so a rejected
//! request has no side effect, including on the last-result slots.

use crate::codec::{ciphertext_from_wire, ciphertext_to_wire};
use crate::error::{CoreError, CoreResult};
use crate::he::{Ciphertext, HeBackend, KeyId};
use crate::keys::EvaluationKeys;
use crate::masks::MaskLibrary;
use crate::plan::{KeySet, LevelBudget, Meta, Op, Reg, StatsProgram, StepTrace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Output ciphertexts of one statistics run
#[derive(Clone, Debug)]
pub struct StatsOutput {
    /// Per-lane squared deltas, duration and gated total distance
    pub stats: Ciphertext,
    /// Duration and total distance selected by the date lanes
    pub summary: Ciphertext,
    /// Raw movement score in lane 0
    pub ml_score: Ciphertext,
}

/// Armored form of [`StatsOutput`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireStats {
    pub stats: String,
    pub summary: String,
    pub ml_score: String,
}

pub struct StatsCircuit<B: HeBackend> {
    backend: B,
    keys: EvaluationKeys,
    program: StatsProgram,
    trace: Vec<StepTrace>,
    masks: MaskLibrary,
    last_added: Option<Ciphertext>,
    last_stats: Option<Ciphertext>,
    last_summary: Option<Ciphertext>,
    last_ml_score: Option<Ciphertext>,
}

impl<B: HeBackend> StatsCircuit<B> {
    /// Bind a provider to one client's evaluation keys.
    ///
    /// Fails if the program does not fit the level budget or needs a
    /// rotation the loaded Galois keys cannot express.
    pub fn new(backend: B, keys: EvaluationKeys) -> CoreResult<Self> {
        let params = backend.params();
        let program = StatsProgram::new(params.slot_count());
        let trace = LevelBudget::new(params, keys.galois.steps(), keys.single_step.steps())
            .validate(&program)?;
        debug!(
            steps = trace.len(),
            key_id = %keys.key_id(),
            "Statistics program validated"
        );

        Ok(Self {
            backend,
            keys,
            program,
            trace,
            masks: MaskLibrary::new(),
            last_added: None,
            last_stats: None,
            last_summary: None,
            last_ml_score: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn key_id(&self) -> KeyId {
        self.keys.key_id()
    }

    /// Statically validated metadata for every program step
    pub fn trace(&self) -> &[StepTrace] {
        &self.trace
    }

    /// Homomorphic sum of two ciphertexts with identical layout
    #[instrument(skip_all)]
    pub fn add_ciphers(&mut self, a: &Ciphertext, b: &Ciphertext) -> CoreResult<Ciphertext> {
        for ct in [a, b] {
            self.check_slots(ct)?;
            self.check_key(ct)?;
        }
        if a.level() != b.level() {
            return Err(CoreError::InputLayout(format!(
                "operands at levels {} and {}",
                a.level(),
                b.level()
            )));
        }
        if a.scale().to_bits() != b.scale().to_bits() {
            return Err(CoreError::InputLayout(format!(
                "operands at scales {} and {}",
                a.scale(),
                b.scale()
            )));
        }

        let sum = self.backend.add(a, b)?;
        self.last_added = Some(sum.clone());
        Ok(sum)
    }

    /// Run the full statistics program.
    ///
    /// All four operands must be fresh encryptions under this circuit's key
    /// with the configured slot count.
    #[instrument(skip_all)]
    pub fn compute_stats(
        &mut self,
        position_a: &Ciphertext,
        position_b: &Ciphertext,
        summary_mask: &Ciphertext,
        gyro: &Ciphertext,
    ) -> CoreResult<StatsOutput> {
        let inputs = [position_a, position_b, summary_mask, gyro];
        for ct in inputs {
            self.check_slots(ct)?;
        }
        for ct in inputs {
            self.check_key(ct)?;
            self.check_fresh(ct)?;
        }

        let mut regs: HashMap<Reg, Ciphertext> = StatsProgram::INPUTS
            .into_iter()
            .zip(inputs)
            .map(|(reg, ct)| (reg, ct.clone()))
            .collect();

        let mut stage = None;
        for (step, planned) in self.program.steps().iter().zip(&self.trace) {
            if stage != Some(step.stage) {
                debug!(stage = ?step.stage, "Circuit stage");
                stage = Some(step.stage);
            }

            let out = Self::execute(&self.backend, &self.keys, &mut self.masks, &regs, &step.op)?;
            let live = Meta {
                scale: out.scale(),
                level: out.level(),
                size: out.size(),
            };
            if live != planned.output {
                return Err(CoreError::Budget {
                    step: planned.index,
                    reason: format!(
                        "provider produced {live:?}, program expects {:?}",
                        planned.output
                    ),
                });
            }
            regs.insert(step.op.target(), out);
        }

        let mut take = |reg: Reg| {
            regs.remove(&reg).ok_or_else(|| CoreError::Budget {
                step: self.trace.len(),
                reason: format!("output register {reg:?} missing"),
            })
        };
        let output = StatsOutput {
            stats: take(StatsProgram::STATS)?,
            summary: take(StatsProgram::SUMMARY)?,
            ml_score: take(StatsProgram::ML_SCORE)?,
        };

        self.last_stats = Some(output.stats.clone());
        self.last_summary = Some(output.summary.clone());
        self.last_ml_score = Some(output.ml_score.clone());
        debug!("Statistics complete");
        Ok(output)
    }

    pub fn add_ciphers_wire(&mut self, a: &str, b: &str) -> CoreResult<String> {
        let params = self.backend.params();
        let a = ciphertext_from_wire(a, params)?;
        let b = ciphertext_from_wire(b, params)?;
        Ok(ciphertext_to_wire(&self.add_ciphers(&a, &b)?))
    }

    pub fn compute_stats_wire(
        &mut self,
        position_a: &str,
        position_b: &str,
        summary_mask: &str,
        gyro: &str,
    ) -> CoreResult<WireStats> {
        let params = self.backend.params();
        let position_a = ciphertext_from_wire(position_a, params)?;
        let position_b = ciphertext_from_wire(position_b, params)?;
        let summary_mask = ciphertext_from_wire(summary_mask, params)?;
        let gyro = ciphertext_from_wire(gyro, params)?;

        let out = self.compute_stats(&position_a, &position_b, &summary_mask, &gyro)?;
        Ok(WireStats {
            stats: ciphertext_to_wire(&out.stats),
            summary: ciphertext_to_wire(&out.summary),
            ml_score: ciphertext_to_wire(&out.ml_score),
        })
    }

    pub fn last_added(&self) -> Option<&Ciphertext> {
        self.last_added.as_ref()
    }

    pub fn last_stats(&self) -> Option<&Ciphertext> {
        self.last_stats.as_ref()
    }

    pub fn last_summary(&self) -> Option<&Ciphertext> {
        self.last_summary.as_ref()
    }

    pub fn last_ml_score(&self) -> Option<&Ciphertext> {
        self.last_ml_score.as_ref()
    }

    fn check_slots(&self, ct: &Ciphertext) -> CoreResult<()> {
        let expected = self.backend.params().slot_count();
        if ct.slot_count() != expected {
            return Err(CoreError::DimensionMismatch {
                expected,
                found: ct.slot_count(),
            });
        }
        Ok(())
    }

    fn check_key(&self, ct: &Ciphertext) -> CoreResult<()> {
        if ct.key_id() != self.keys.key_id() {
            return Err(CoreError::KeyMismatch(format!(
                "ciphertext under {}, circuit holds keys for {}",
                ct.key_id(),
                self.keys.key_id()
            )));
        }
        Ok(())
    }

    fn check_fresh(&self, ct: &Ciphertext) -> CoreResult<()> {
        let params = self.backend.params();
        if ct.level() != params.top_level()
            || ct.scale().to_bits() != params.scale().to_bits()
            || ct.size() != 2
        {
            return Err(CoreError::InputLayout(format!(
                "expected a fresh encryption (scale {}, level {}), got scale {} level {} size {}",
                params.scale(),
                params.top_level(),
                ct.scale(),
                ct.level(),
                ct.size()
            )));
        }
        Ok(())
    }

    fn execute(
        backend: &B,
        keys: &EvaluationKeys,
        masks: &mut MaskLibrary,
        regs: &HashMap<Reg, Ciphertext>,
        op: &Op,
    ) -> CoreResult<Ciphertext> {
        let read = |reg: Reg| {
            regs.get(&reg).ok_or_else(|| CoreError::Budget {
                step: 0,
                reason: format!("register {reg:?} read before written"),
            })
        };
        let params = backend.params();

        let out = match *op {
            Op::Copy { src, .. } => read(src)?.clone(),
            Op::Add { dst, src } => backend.add(read(dst)?, read(src)?)?,
            Op::Sub { dst, src } => backend.sub(read(dst)?, read(src)?)?,
            Op::MulPlain {
                src, mask, scale, ..
            } => {
                let src = read(src)?;
                let scale = scale.resolve(params, src.scale());
                let mask = masks.get(backend, mask, scale, src.level())?;
                backend.multiply_plain(src, mask)?
            }
            Op::AddPlain { dst, mask, scale } => {
                let dst = read(dst)?;
                let scale = scale.resolve(params, dst.scale());
                let mask = masks.get(backend, mask, scale, dst.level())?;
                backend.add_plain(dst, mask)?
            }
            Op::Multiply { dst, src } => backend.multiply(read(dst)?, read(src)?)?,
            Op::Square { reg } => backend.square(read(reg)?)?,
            Op::Relinearize { reg } => backend.relinearize(read(reg)?, &keys.relin)?,
            Op::Rescale { reg } => backend.rescale(read(reg)?)?,
            Op::ModSwitch { reg } => backend.mod_switch(read(reg)?)?,
            Op::Rotate {
                src,
                step,
                keys: set,
                ..
            } => {
                let galois = match set {
                    KeySet::Generic => &keys.galois,
                    KeySet::SingleStep => &keys.single_step,
                };
                backend.rotate(read(src)?, step, galois)?
            }
        };
        Ok(out)
    }
}
