//! Reduce battery results to summary p-values.
//!
//! Extraction only selects fields; it never computes. Each [`TestResult`]
//! variant has exactly one place its canonical p-value lives.

use serde::Serialize;

use crate::error::ExtractError;
use crate::result::{Chi2Result, GofTest, TestResult};

/// Labels of the walk sub-statistics, in extraction order.
pub const WALK_LABELS: [&str; 5] = ["H", "M", "J", "R", "C"];

/// Summary p-value(s) of one test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PValueSummary {
    Scalar(f64),
    /// Walk sub-statistics in the order of [`WALK_LABELS`].
    Walk([f64; 5]),
}

impl PValueSummary {
    /// All p-values in order.
    pub fn values(&self) -> &[f64] {
        match self {
            Self::Scalar(p) => std::slice::from_ref(p),
            Self::Walk(ps) => ps,
        }
    }
}

/// Return the summary p-value(s) of `result`.
pub fn extract_p_values(result: &TestResult) -> Result<PValueSummary, ExtractError> {
    let summary = match result {
        TestResult::Poisson(res) => PValueSummary::Scalar(res.p_value),
        TestResult::Chi2(res) => PValueSummary::Scalar(res.gof[GofTest::Mean]),
        TestResult::KnuthBasic(res) => PValueSummary::Scalar(res.basic.gof[GofTest::Mean]),
        TestResult::KnuthPoisson(res) => PValueSummary::Scalar(res.poisson.p_value),
        TestResult::String(res) => PValueSummary::Scalar(res.basic.gof[GofTest::Mean]),
        TestResult::Walk(res) => {
            let subs = [&res.h, &res.m, &res.j, &res.r, &res.c];
            let mut pvals = [0.0; 5];
            for ((slot, sub), label) in pvals.iter_mut().zip(subs).zip(WALK_LABELS) {
                *slot = first_mean(sub, label)?;
            }
            PValueSummary::Walk(pvals)
        }
    };
    Ok(summary)
}

fn first_mean(sub: &[Chi2Result], label: &'static str) -> Result<f64, ExtractError> {
    sub.first()
        .map(|res| res.gof[GofTest::Mean])
        .ok_or(ExtractError::MissingSubResult {
            test: "walk",
            label,
        })
}
