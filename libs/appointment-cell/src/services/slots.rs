// libs/appointment-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use professional_cell::models::{AvailabilityWindow, TimeRange};
use professional_cell::store::AvailabilityStore;

use crate::models::{Appointment, AppointmentError, Slot};
use crate::services::repository::AppointmentRepository;

/// Computes bookable slots by subtracting capacity-consuming appointments
/// from a professional's availability windows.
pub struct SlotResolver {
    windows: Arc<dyn AvailabilityStore>,
    appointments: Arc<AppointmentRepository>,
    merge_windows: bool,
}

impl SlotResolver {
    pub fn new(
        windows: Arc<dyn AvailabilityStore>,
        appointments: Arc<AppointmentRepository>,
        merge_windows: bool,
    ) -> Self {
        Self {
            windows,
            appointments,
            merge_windows,
        }
    }

    /// Slots for `professional_id` clipped to `range`, ordered by start.
    /// `exclude` leaves one appointment out of the subtraction so it can be
    /// moved within its own interval.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        professional_id: Uuid,
        range: &TimeRange,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Slot>, AppointmentError> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(AppointmentError::InvalidRange(
                    "search start must not be after search end".to_string(),
                ));
            }
        }

        let windows = self.windows.list(professional_id, range).await?;
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let appointments: Vec<Appointment> = self
            .appointments
            .list_holding_capacity(professional_id, &window_span(&windows))
            .await?
            .into_iter()
            .filter(|a| Some(a.id) != exclude)
            .collect();

        let slots = compute_slots(&windows, &appointments, range, self.merge_windows);
        debug!(
            "Resolved {} slots from {} windows and {} appointments",
            slots.len(),
            windows.len(),
            appointments.len()
        );
        Ok(slots)
    }

    /// Recomputes slots for exactly `[from, to)` and succeeds only if one
    /// of them covers the whole interval.
    pub async fn ensure_bookable(
        &self,
        professional_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let range = TimeRange::new(Some(from), Some(to));
        let slots = self.resolve(professional_id, &range, exclude).await?;

        if slots.iter().any(|slot| slot.contains(from, to)) {
            Ok(())
        } else {
            warn!("Interval {} - {} is not free for professional {}", from, to, professional_id);
            Err(AppointmentError::SlotUnavailable)
        }
    }
}

/// Pure slot computation.
///
/// Windows are filtered with the inclusive test `to >= range.from AND
/// from <= range.to`, each window has every overlapping appointment
/// subtracted, and the residuals are clipped to the range. Malformed
/// windows or appointments are skipped.
pub fn compute_slots(
    windows: &[AvailabilityWindow],
    appointments: &[Appointment],
    range: &TimeRange,
    merge_windows: bool,
) -> Vec<Slot> {
    let mut intervals: Vec<Slot> = windows
        .iter()
        .filter(|w| {
            if !w.is_well_formed() {
                warn!("Skipping malformed availability window {} ({} >= {})", w.id, w.from, w.to);
                return false;
            }
            true
        })
        .filter(|w| range.touches(w.from, w.to))
        .map(|w| Slot::new(w.from, w.to))
        .collect();

    if merge_windows {
        intervals = merge(intervals);
    }

    let busy: Vec<Slot> = appointments
        .iter()
        .filter(|a| a.holds_capacity())
        .filter(|a| {
            if a.from >= a.to {
                warn!("Skipping malformed appointment {} ({} >= {})", a.id, a.from, a.to);
                return false;
            }
            true
        })
        .map(|a| Slot::new(a.from, a.to))
        .collect();

    let mut slots: Vec<Slot> = intervals
        .into_iter()
        .flat_map(|window| subtract(window, &busy))
        .filter_map(|slot| clip(slot, range))
        .collect();

    slots.sort();
    slots
}

/// Removes every busy interval from `window`, returning what is left.
fn subtract(window: Slot, busy: &[Slot]) -> Vec<Slot> {
    let mut residual = vec![window];

    for taken in busy {
        residual = residual
            .into_iter()
            .flat_map(|free| {
                if taken.to <= free.from || taken.from >= free.to {
                    return vec![free];
                }

                let mut pieces = Vec::with_capacity(2);
                if taken.from > free.from {
                    pieces.push(Slot::new(free.from, taken.from));
                }
                if taken.to < free.to {
                    pieces.push(Slot::new(taken.to, free.to));
                }
                pieces
            })
            .collect();

        if residual.is_empty() {
            break;
        }
    }

    residual
}

fn clip(slot: Slot, range: &TimeRange) -> Option<Slot> {
    let from = range.from.map_or(slot.from, |start| slot.from.max(start));
    let to = range.to.map_or(slot.to, |end| slot.to.min(end));
    let clipped = Slot::new(from, to);
    (!clipped.is_empty()).then_some(clipped)
}

/// Unions overlapping and adjacent intervals.
fn merge(mut intervals: Vec<Slot>) -> Vec<Slot> {
    intervals.sort();

    let mut merged: Vec<Slot> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.from <= last.to => last.to = last.to.max(interval.to),
            _ => merged.push(interval),
        }
    }
    merged
}

fn window_span(windows: &[AvailabilityWindow]) -> TimeRange {
    let from = windows.iter().map(|w| w.from).min();
    let to = windows.iter().map(|w| w.to).max();
    TimeRange::new(from, to)
}

// ==============================================================================
// DAY GRANULAR VIEWS
// ==============================================================================

/// Distinct UTC dates on which at least one slot starts, ascending.
pub fn available_dates(slots: &[Slot]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = slots.iter().map(|s| s.from.date_naive()).collect();
    dates.sort();
    dates.dedup();
    dates
}

/// Slots starting on `date` (UTC).
pub fn slots_on(slots: &[Slot], date: NaiveDate) -> Vec<Slot> {
    slots
        .iter()
        .filter(|s| s.from.date_naive() == date)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::{AppointmentStatus, PaymentStatus};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            professional_id: Uuid::nil(),
            from,
            to,
            created_at: at(1, 0, 0),
        }
    }

    fn appointment(from: DateTime<Utc>, to: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            professional_id: Uuid::nil(),
            patient_id: Uuid::new_v4(),
            from,
            to,
            status,
            payment_status: PaymentStatus::Unpaid,
            payment_order_id: None,
            payment_reference: None,
            version: 1,
            created_at: at(1, 0, 0),
            updated_at: at(1, 0, 0),
        }
    }

    #[test]
    fn inner_appointment_splits_window() {
        let slots = compute_slots(
            &[window(at(10, 9, 0), at(10, 12, 0))],
            &[appointment(at(10, 10, 0), at(10, 11, 0), AppointmentStatus::Accepted)],
            &TimeRange::unbounded(),
            false,
        );
        assert_eq!(
            slots,
            vec![
                Slot::new(at(10, 9, 0), at(10, 10, 0)),
                Slot::new(at(10, 11, 0), at(10, 12, 0)),
            ]
        );
    }

    #[test]
    fn covering_and_partial_appointments() {
        let windows = [
            window(at(10, 9, 0), at(10, 10, 0)),
            window(at(10, 13, 0), at(10, 16, 0)),
        ];
        let appointments = [
            appointment(at(10, 8, 0), at(10, 11, 0), AppointmentStatus::Pending),
            appointment(at(10, 15, 0), at(10, 17, 0), AppointmentStatus::Pending),
        ];

        let slots = compute_slots(&windows, &appointments, &TimeRange::unbounded(), false);
        assert_eq!(slots, vec![Slot::new(at(10, 13, 0), at(10, 15, 0))]);
    }

    #[test]
    fn released_appointments_do_not_consume_capacity() {
        let slots = compute_slots(
            &[window(at(10, 9, 0), at(10, 12, 0))],
            &[
                appointment(at(10, 9, 0), at(10, 10, 0), AppointmentStatus::Rejected),
                appointment(at(10, 10, 0), at(10, 11, 0), AppointmentStatus::Cancelled),
            ],
            &TimeRange::unbounded(),
            false,
        );
        assert_eq!(slots, vec![Slot::new(at(10, 9, 0), at(10, 12, 0))]);
    }

    #[test]
    fn overlapping_windows_pass_through_unless_merged() {
        let windows = [
            window(at(10, 9, 0), at(10, 11, 0)),
            window(at(10, 10, 0), at(10, 12, 0)),
            window(at(10, 12, 0), at(10, 13, 0)),
        ];

        let raw = compute_slots(&windows, &[], &TimeRange::unbounded(), false);
        assert_eq!(raw.len(), 3);

        let merged = compute_slots(&windows, &[], &TimeRange::unbounded(), true);
        assert_eq!(merged, vec![Slot::new(at(10, 9, 0), at(10, 13, 0))]);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let slots = compute_slots(
            &[window(at(10, 12, 0), at(10, 9, 0)), window(at(11, 9, 0), at(11, 10, 0))],
            &[appointment(at(11, 9, 30), at(11, 9, 30), AppointmentStatus::Pending)],
            &TimeRange::unbounded(),
            false,
        );
        assert_eq!(slots, vec![Slot::new(at(11, 9, 0), at(11, 10, 0))]);
    }

    #[test]
    fn residuals_are_clipped_to_range() {
        let range = TimeRange::new(Some(at(10, 10, 0)), Some(at(10, 11, 0)));
        let slots = compute_slots(&[window(at(10, 9, 0), at(10, 12, 0))], &[], &range, false);
        assert_eq!(slots, vec![Slot::new(at(10, 10, 0), at(10, 11, 0))]);

        // Touching the range is enough to be considered, but leaves nothing after clipping.
        let touching = TimeRange::new(Some(at(10, 12, 0)), None);
        assert!(compute_slots(&[window(at(10, 9, 0), at(10, 12, 0))], &[], &touching, false).is_empty());
    }

    #[test]
    fn no_windows_means_no_slots() {
        assert!(compute_slots(&[], &[], &TimeRange::unbounded(), false).is_empty());
    }

    #[test]
    fn day_views_group_by_start_date() {
        let slots = vec![
            Slot::new(at(10, 9, 0), at(10, 10, 0)),
            Slot::new(at(10, 23, 0), at(11, 1, 0)),
            Slot::new(at(12, 9, 0), at(12, 10, 0)),
        ];

        let dates = available_dates(&slots);
        assert_eq!(dates, vec![at(10, 0, 0).date_naive(), at(12, 0, 0).date_naive()]);
        assert_eq!(slots_on(&slots, at(10, 0, 0).date_naive()).len(), 2);
        assert!(slots_on(&slots, at(11, 0, 0).date_naive()).is_empty());
    }
}
