use chrono::{DateTime, FixedOffset, NaiveDateTime};
use shared::{duration_from_hours, DrivingSegment, HosPlan, HosStop, HosStopKind};

use crate::error::{PlannerError, PlannerResult};

/// Tolerance for threshold comparisons, in hours.
pub const HOURS_EPSILON: f64 = 1e-4;

/// Slowest average speed a plan accepts.
pub const MIN_AVG_SPEED_MPH: f64 = 1.0;

/// Driver limits. Defaults follow the US property-carrying rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HosRules {
    /// Cumulative driving since the last break after which a break is due.
    pub break_after_hours: f64,
    pub break_duration_hours: f64,
    /// Cumulative driving since the last reset after which the shift ends.
    pub shift_limit_hours: f64,
    pub reset_duration_hours: f64,
}

impl Default for HosRules {
    fn default() -> Self {
        Self {
            break_after_hours: 8.0,
            break_duration_hours: 0.5,
            shift_limit_hours: 11.0,
            reset_duration_hours: 10.0,
        }
    }
}

impl HosRules {
    pub fn validate(&self) -> PlannerResult<()> {
        let fields = [
            ("break_after_hours", self.break_after_hours),
            ("break_duration_hours", self.break_duration_hours),
            ("shift_limit_hours", self.shift_limit_hours),
            ("reset_duration_hours", self.reset_duration_hours),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(PlannerError::InvalidInput(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HosParams {
    pub total_miles: f64,
    pub departure: DateTime<FixedOffset>,
    pub avg_speed_mph: f64,
    /// Driving hours left in the current shift; `None` means a fresh shift.
    pub drive_hours_available: Option<f64>,
}

/// Accepts RFC 3339, or a zone-less `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
pub fn parse_departure(raw: &str) -> PlannerResult<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(PlannerError::InvalidInput(format!(
        "departure time '{raw}' is not a valid timestamp"
    )))
}

#[derive(Debug, Default)]
struct DriveState {
    miles_driven: f64,
    hours_since_break: f64,
    hours_since_reset: f64,
    /// Hours since departure, driving and stops included.
    elapsed_hours: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HosPlanner {
    rules: HosRules,
}

impl HosPlanner {
    pub fn new(rules: HosRules) -> Self {
        Self { rules }
    }

    /// Validates the rules and driver inputs, returning the hours available
    /// in the current shift.
    pub fn check_driver_inputs(
        &self,
        avg_speed_mph: f64,
        drive_hours_available: Option<f64>,
    ) -> PlannerResult<f64> {
        self.rules.validate()?;
        if !avg_speed_mph.is_finite() || avg_speed_mph < MIN_AVG_SPEED_MPH {
            return Err(PlannerError::InvalidInput(format!(
                "average speed must be at least {MIN_AVG_SPEED_MPH} mph, got {avg_speed_mph}"
            )));
        }
        let shift = self.rules.shift_limit_hours;
        let available = drive_hours_available.unwrap_or(shift);
        if !available.is_finite() || available < 0.0 || available > shift {
            return Err(PlannerError::InvalidInput(format!(
                "driving hours available must be between 0 and {shift}, got {available}"
            )));
        }
        Ok(available)
    }

    /// Splits the drive into legal segments separated by breaks and resets.
    ///
    /// The driver is assumed to start right after a qualifying break, so the
    /// break counter starts at zero while the shift counter starts from
    /// `drive_hours_available`.
    pub fn plan(&self, params: &HosParams) -> PlannerResult<HosPlan> {
        let rules = self.rules;
        let total = params.total_miles;
        let speed = params.avg_speed_mph;

        let available = self.check_driver_inputs(speed, params.drive_hours_available)?;
        if !total.is_finite() || total <= 0.0 {
            return Err(PlannerError::InvalidInput(format!(
                "trip distance must be positive, got {total}"
            )));
        }

        let at = |elapsed: f64| params.departure + duration_from_hours(elapsed);
        let mut state = DriveState {
            hours_since_reset: rules.shift_limit_hours - available,
            ..DriveState::default()
        };
        let mut stops = Vec::new();
        let mut segments = Vec::new();

        if available <= HOURS_EPSILON {
            stops.push(HosStop {
                kind: HosStopKind::OffDutyReset,
                mile: 0.0,
                starts_at: at(0.0),
                duration_hours: rules.reset_duration_hours,
            });
            state.elapsed_hours += rules.reset_duration_hours;
            state.hours_since_reset = 0.0;
            state.hours_since_break = 0.0;
        }

        loop {
            let until_break = rules.break_after_hours - state.hours_since_break;
            let until_reset = rules.shift_limit_hours - state.hours_since_reset;
            let to_destination = (total - state.miles_driven) / speed;
            let limit = until_break.min(until_reset);
            let arrives = to_destination <= limit + HOURS_EPSILON;
            let drive = if arrives { to_destination } else { limit };

            if !arrives && drive <= HOURS_EPSILON {
                return Err(PlannerError::InternalConsistency(format!(
                    "no driving time available at mile {:.1} with {:.1} miles remaining",
                    state.miles_driven,
                    total - state.miles_driven
                )));
            }

            let start_mile = state.miles_driven;
            let starts_at = at(state.elapsed_hours);
            state.miles_driven = if arrives {
                total
            } else {
                start_mile + drive * speed
            };
            state.elapsed_hours += drive;
            state.hours_since_break += drive;
            state.hours_since_reset += drive;
            segments.push(DrivingSegment {
                start_mile,
                end_mile: state.miles_driven,
                starts_at,
                ends_at: at(state.elapsed_hours),
                hours: drive,
            });

            if arrives {
                break;
            }

            let stop = if state.hours_since_reset >= rules.shift_limit_hours - HOURS_EPSILON {
                state.hours_since_reset = 0.0;
                state.hours_since_break = 0.0;
                HosStop {
                    kind: HosStopKind::OffDutyReset,
                    mile: state.miles_driven,
                    starts_at: at(state.elapsed_hours),
                    duration_hours: rules.reset_duration_hours,
                }
            } else if state.hours_since_break >= rules.break_after_hours - HOURS_EPSILON {
                state.hours_since_break = 0.0;
                HosStop {
                    kind: HosStopKind::Break,
                    mile: state.miles_driven,
                    starts_at: at(state.elapsed_hours),
                    duration_hours: rules.break_duration_hours,
                }
            } else {
                return Err(PlannerError::InternalConsistency(format!(
                    "segment ended at mile {:.1} without reaching a limit",
                    state.miles_driven
                )));
            };
            state.elapsed_hours += stop.duration_hours;
            tracing::trace!(kind = ?stop.kind, mile = stop.mile, "hos stop");
            stops.push(stop);
        }

        let driving_hours = segments.iter().map(|segment| segment.hours).sum();
        let stop_hours = stops.iter().map(|stop| stop.duration_hours).sum();
        tracing::debug!(
            miles = total,
            stops = stops.len(),
            elapsed_hours = state.elapsed_hours,
            "hos plan built"
        );

        Ok(HosPlan {
            departure: params.departure,
            arrival: at(state.elapsed_hours),
            stops,
            segments,
            driving_hours,
            stop_hours,
        })
    }
}
