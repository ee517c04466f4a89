//! Medical exam adjustments
//!
//! Reads the latest exam of each type and derives advisory multipliers for
//! volume, intensity and recovery. The bundle is reported next to a newly
//! generated plan; it is never folded into persisted volume.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{BodyComposition, ExamResult, ExamType, LungFunction, Vo2maxTest};
use crate::store::Store;

/// Advisory multipliers derived from the latest medical exams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamAdjustments {
    pub volume_factor: f64,
    pub intensity_factor: f64,
    pub recovery_factor: f64,
    /// Human-readable notes in rule evaluation order
    pub recommendations: Vec<String>,
    /// Anaerobic threshold as a percentage of VO2max
    pub threshold_percent: Option<f64>,
}

impl Default for ExamAdjustments {
    fn default() -> Self {
        Self {
            volume_factor: 1.0,
            intensity_factor: 1.0,
            recovery_factor: 1.0,
            recommendations: Vec::new(),
            threshold_percent: None,
        }
    }
}

impl ExamAdjustments {
    pub fn is_neutral(&self) -> bool {
        self.recommendations.is_empty() && self.threshold_percent.is_none()
    }
}

pub struct ExamAdjuster;

impl ExamAdjuster {
    /// Adjustments for an athlete from the most recent exam of each type.
    /// Missing exam types are skipped.
    pub fn for_athlete<S: Store>(store: &S, athlete_id: &str) -> Result<ExamAdjustments> {
        store.get_athlete(athlete_id)?;

        let mut body = None;
        let mut lung = None;
        let mut vo2max = None;
        for exam_type in ExamType::ALL {
            let Some(record) = store.latest_exam(athlete_id, exam_type)? else {
                continue;
            };
            match record.result {
                ExamResult::BodyComposition(exam) => body = Some(exam),
                ExamResult::LungFunction(exam) => lung = Some(exam),
                ExamResult::Vo2max(exam) => vo2max = Some(exam),
            }
        }

        Ok(Self::evaluate(body.as_ref(), lung.as_ref(), vo2max.as_ref()))
    }

    /// Apply the threshold rules: body composition, then lung function, then VO2max
    pub fn evaluate(
        body: Option<&BodyComposition>,
        lung: Option<&LungFunction>,
        vo2max: Option<&Vo2maxTest>,
    ) -> ExamAdjustments {
        let mut adjustments = ExamAdjustments::default();

        if let Some(exam) = body {
            Self::apply_body_composition(&mut adjustments, exam);
        }
        if let Some(exam) = lung {
            Self::apply_lung_function(&mut adjustments, exam);
        }
        if let Some(exam) = vo2max {
            Self::apply_vo2max(&mut adjustments, exam);
        }

        adjustments
    }

    fn apply_body_composition(adjustments: &mut ExamAdjustments, exam: &BodyComposition) {
        if let Some(body_fat) = exam.body_fat_percent {
            if body_fat > 25.0 {
                adjustments.volume_factor *= 0.9;
                adjustments.recovery_factor *= 1.1;
                adjustments.recommendations.push(format!(
                    "Body fat at {:.1}%: build volume gradually and allow extra recovery",
                    body_fat
                ));
            } else if body_fat < 10.0 {
                adjustments.recovery_factor *= 1.15;
                adjustments.recommendations.push(format!(
                    "Body fat at {:.1}%: prioritize recovery and energy availability",
                    body_fat
                ));
            }
        }

        if let Some(bmr) = exam.basal_metabolic_rate {
            if bmr < 1500.0 {
                adjustments.volume_factor *= 0.95;
                adjustments.recommendations.push(format!(
                    "Basal metabolic rate of {:.1} kcal: keep weekly volume conservative",
                    bmr
                ));
            }
        }
    }

    fn apply_lung_function(adjustments: &mut ExamAdjustments, exam: &LungFunction) {
        let Some(ratio) = exam.fev1_fvc_ratio else {
            return;
        };
        if ratio < 70.0 {
            adjustments.intensity_factor *= 0.85;
            adjustments.recommendations.push(format!(
                "FEV1/FVC ratio of {:.1}%: reduce high-intensity work",
                ratio
            ));
        } else if ratio > 90.0 {
            adjustments.intensity_factor *= 1.05;
            adjustments.recommendations.push(format!(
                "FEV1/FVC ratio of {:.1}%: lung function supports higher intensity",
                ratio
            ));
        }
    }

    fn apply_vo2max(adjustments: &mut ExamAdjustments, exam: &Vo2maxTest) {
        let Some(vo2max) = exam.vo2max else {
            return;
        };
        if vo2max < 35.0 {
            adjustments.volume_factor *= 0.9;
            adjustments.intensity_factor *= 0.9;
            adjustments.recommendations.push(format!(
                "VO2max of {:.1} ml/kg/min: focus on aerobic base building",
                vo2max
            ));
        } else if vo2max > 55.0 {
            adjustments.volume_factor *= 1.1;
            adjustments.intensity_factor *= 1.1;
            adjustments.recommendations.push(format!(
                "VO2max of {:.1} ml/kg/min: aerobic capacity supports more volume and intensity",
                vo2max
            ));
        }

        if let Some(threshold) = exam.anaerobic_threshold {
            if vo2max > 0.0 {
                adjustments.threshold_percent = Some(threshold / vo2max * 100.0);
            }
        }
    }
}
