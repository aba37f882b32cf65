//! Text and JSON reports.
//!
//! The text layout follows the classic battery report: one block per test
//! with its parameters and p-values, then a summary listing every p-value
//! outside `[0.001, 0.999]`. [`Detail`] controls how much of each block is
//! written.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use pitcrush_core::{Chi2Result, GofSummary, GofTest, PoissonResult, TestResult};
use serde::{Deserialize, Serialize};

use crate::battery::{BatteryOutcome, NamedResult};
use crate::error::BatteryError;
use crate::stats::SUSPECT_P;

const RULE: &str = "===========================================================";
const THIN_RULE: &str = "-----------------------------------------------------------";

/// p-values below this print as `eps`.
const EPS: f64 = 1.0e-300;
/// p-values within this of one print as `1 - eps1`.
const EPS1: f64 = 1.0e-15;

/// How much of each test block the text report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    /// Header and closing summary only.
    Summary,
    /// Parameters, statistics and p-values of every test.
    #[default]
    Basic,
    /// Basic plus per-class counts and both Poisson tails.
    Verbose,
}

impl Detail {
    pub const ALL: [Detail; 3] = [Detail::Summary, Detail::Basic, Detail::Verbose];

    pub fn name(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Basic => "basic",
            Self::Verbose => "verbose",
        }
    }
}

impl std::fmt::Display for Detail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Detail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown report detail {s:?} (expected summary, basic or verbose)")
            })
    }
}

/// Format a p-value the way battery reports do.
///
/// ```
/// use pitcrush_battery::report::format_p_value;
/// assert_eq!(format_p_value(0.25), "0.2500");
/// assert_eq!(format_p_value(1.0e-320), "eps");
/// assert_eq!(format_p_value(1.0), "1 - eps1");
/// assert_eq!(format_p_value(0.0042), "4.2e-3");
/// ```
pub fn format_p_value(p: f64) -> String {
    if p.is_nan() {
        "---".to_string()
    } else if p < EPS {
        "eps".to_string()
    } else if p > 1.0 - EPS1 {
        "1 - eps1".to_string()
    } else if p < 0.01 {
        format!("{p:.1e}")
    } else if p > 0.99 {
        format!("1 - {:.1e}", 1.0 - p)
    } else {
        format!("{p:.4}")
    }
}

/// `hh:mm:ss.cc`.
fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let centis = elapsed.subsec_millis() / 10;
    format!(
        "{:02}:{:02}:{:02}.{centis:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

pub fn write_header<W: Write + ?Sized>(
    out: &mut W,
    battery: &str,
    generator: &str,
) -> Result<(), BatteryError> {
    writeln!(out, "{RULE}")?;
    writeln!(out, " Starting battery {battery}")?;
    writeln!(out, " Generator: {generator}")?;
    writeln!(out, "{RULE}\n")?;
    Ok(())
}

fn write_gof<W: Write + ?Sized>(out: &mut W, gof: &GofSummary) -> Result<(), BatteryError> {
    let labels = [
        (GofTest::KsPlus, "Kolmogorov-Smirnov+"),
        (GofTest::KsMinus, "Kolmogorov-Smirnov-"),
        (GofTest::AndersonDarling, "Anderson-Darling"),
    ];
    for (test, label) in labels {
        if gof.p_value(test).is_finite() {
            writeln!(
                out,
                "   {label:<22}: {:>10.4}   p-value = {}",
                gof.statistic(test),
                format_p_value(gof.p_value(test))
            )?;
        }
    }
    Ok(())
}

fn write_classes<W: Write + ?Sized>(out: &mut W, res: &Chi2Result) -> Result<(), BatteryError> {
    writeln!(out, "   {:>8} {:>14} {:>14}", "class", "observed", "expected")?;
    for (i, (observed, expected)) in res.observed.iter().zip(&res.expected).enumerate() {
        writeln!(out, "   {i:>8} {observed:>14} {expected:>14.2}")?;
    }
    Ok(())
}

fn write_poisson_tails<W: Write + ?Sized>(
    out: &mut W,
    res: &PoissonResult,
) -> Result<(), BatteryError> {
    writeln!(out, "   P(X <= observed)              = {}", format_p_value(res.p_left))?;
    writeln!(out, "   P(X >= observed)              = {}", format_p_value(res.p_right))?;
    Ok(())
}

fn write_chi2<W: Write + ?Sized>(
    out: &mut W,
    label: &str,
    res: &Chi2Result,
    detail: Detail,
) -> Result<(), BatteryError> {
    if detail == Detail::Verbose {
        write_classes(out, res)?;
    }
    write_gof(out, &res.gof)?;
    writeln!(
        out,
        "   {label}: chi-square = {:.2} with {} degrees of freedom, p-value = {}",
        res.gof.statistic(GofTest::Mean),
        res.degrees_of_freedom * res.replications,
        format_p_value(res.gof[GofTest::Mean])
    )?;
    Ok(())
}

/// Write one test block at the given detail. [`Detail::Summary`] writes nothing.
pub fn write_result<W: Write + ?Sized>(
    out: &mut W,
    named: &NamedResult,
    detail: Detail,
) -> Result<(), BatteryError> {
    if detail == Detail::Summary {
        return Ok(());
    }
    let verbose = detail == Detail::Verbose;
    writeln!(out, "{RULE}")?;
    writeln!(out, " {} test:", named.name)?;
    writeln!(out, "{THIN_RULE}")?;
    writeln!(out, "   {}\n", named.spec)?;

    match &named.result {
        TestResult::Poisson(res) => {
            writeln!(out, "   Expected number of collisions = {:.2}", res.mu)?;
            writeln!(out, "   Observed number of collisions = {}", res.observed)?;
            writeln!(out, "   p-value of test               = {}", format_p_value(res.p_value))?;
            if verbose {
                write_poisson_tails(out, res)?;
            }
        }
        TestResult::Chi2(res) => write_chi2(out, "Test", res, detail)?,
        TestResult::KnuthBasic(res) => {
            write_chi2(out, "Histogram", &res.chi2, detail)?;
            write_gof(out, &res.basic.gof)?;
            writeln!(
                out,
                "   Anderson-Darling on the values: A2 = {:.4}, p-value = {}",
                res.basic.gof.statistic(GofTest::Mean),
                format_p_value(res.basic.gof[GofTest::Mean])
            )?;
        }
        TestResult::KnuthPoisson(res) => {
            write_gof(out, &res.basic.gof)?;
            writeln!(
                out,
                "   Normal approximation: z = {:.4}, p-value = {}",
                res.basic.gof.statistic(GofTest::Mean),
                format_p_value(res.basic.gof[GofTest::Mean])
            )?;
            writeln!(
                out,
                "   Expected {:.2} collisions, observed {}, p-value = {}",
                res.poisson.mu,
                res.poisson.observed,
                format_p_value(res.poisson.p_value)
            )?;
            if verbose {
                write_poisson_tails(out, &res.poisson)?;
            }
        }
        TestResult::String(res) => {
            writeln!(out, "   Weight classes: {}", res.classes.len())?;
            write_gof(out, &res.basic.gof)?;
            writeln!(
                out,
                "   Test: chi-square = {:.2}, p-value = {}",
                res.basic.gof.statistic(GofTest::Mean),
                format_p_value(res.basic.gof[GofTest::Mean])
            )?;
        }
        TestResult::Walk(res) => {
            for (i, length) in res.lengths.iter().enumerate() {
                writeln!(out, "   Walk length {length}:")?;
                let statistics = [
                    ("H", &res.h),
                    ("M", &res.m),
                    ("J", &res.j),
                    ("R", &res.r),
                    ("C", &res.c),
                ];
                for (label, sub) in statistics {
                    if let Some(sub) = sub.get(i) {
                        write_chi2(out, &format!("Statistic {label}"), sub, detail)?;
                    }
                }
            }
        }
    }
    writeln!(out, "\n   Time used: {}\n", format_duration(named.elapsed))?;
    Ok(())
}

pub fn write_summary<W: Write + ?Sized>(
    out: &mut W,
    outcome: &BatteryOutcome,
) -> Result<(), BatteryError> {
    let suspects = outcome.suspects()?;
    writeln!(out, "\n========= Summary results of {} =========\n", outcome.battery)?;
    writeln!(out, " Generator:            {}", outcome.generator)?;
    writeln!(out, " Number of statistics: {}", outcome.statistic_count()?)?;
    writeln!(out, " Total time:           {}\n", format_duration(outcome.elapsed))?;

    if suspects.is_empty() {
        writeln!(out, " All tests were passed\n")?;
        return Ok(());
    }
    writeln!(
        out,
        " The following tests gave p-values outside [{SUSPECT_P}, {:.4}]:",
        1.0 - SUSPECT_P
    )?;
    writeln!(out, " (eps  means a value < {EPS:.1e}):")?;
    writeln!(out, " (eps1 means a value < {EPS1:.1e}):\n")?;
    writeln!(out, "       Test                          p-value")?;
    writeln!(out, " ----------------------------------------------")?;
    for s in &suspects {
        let name = match s.label {
            Some(label) => format!("{}, {label}", s.test),
            None => s.test.to_string(),
        };
        writeln!(out, " {:>2}  {name:<30}{:>12}", s.index, format_p_value(s.p_value))?;
    }
    writeln!(out, " ----------------------------------------------")?;
    writeln!(out, " All other tests were passed\n")?;
    Ok(())
}

/// Write `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), BatteryError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(std::io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
