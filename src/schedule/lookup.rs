use anyhow::{Context, Result};
use chrono::NaiveTime;
use tracing::{debug, warn};

use super::ScheduleStore;
use crate::clock;

/// The next train between two stations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub train_name: String,
    pub train_number: String,
    /// Display name of the origin station
    pub origin: String,
    pub departs: NaiveTime,
    /// Display name of the destination station
    pub destination: String,
    pub arrives: NaiveTime,
}

/// One (origin stop, destination stop) pair on the same train
struct StopPair {
    train_id: i64,
    train_name: String,
    train_number: String,
    origin: String,
    departs: String,
    destination: String,
    arrives: String,
}

// Stations match by full name or short name, exact and case-sensitive.
const STOP_PAIRS_SQL: &str = "
    SELECT tr.id, tr.name, tr.number,
           so.name, dep.time,
           sd.name, arr.time
    FROM times dep
    JOIN times arr ON arr.train_id = dep.train_id AND arr.id != dep.id
    JOIN trains tr ON tr.id = dep.train_id
    JOIN stations so ON so.id = dep.station_id
    JOIN stations sd ON sd.id = arr.station_id
    WHERE (so.name = ?1 OR so.short_name = ?1)
      AND (sd.name = ?2 OR sd.short_name = ?2)
";

impl ScheduleStore {
    /// Earliest departure from `origin` to `destination` leaving strictly
    /// after `after`. `Ok(None)` means no train qualifies; `Err` means the
    /// store could not be read.
    pub async fn find_next_departure(
        &self,
        origin: &str,
        destination: &str,
        after: NaiveTime,
    ) -> Result<Option<Departure>> {
        let pairs = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare_cached(STOP_PAIRS_SQL)
                .context("Failed to prepare departure query")?;
            let pairs = stmt
                .query_map(rusqlite::params![origin, destination], |row| {
                    Ok(StopPair {
                        train_id: row.get(0)?,
                        train_name: row.get(1)?,
                        train_number: row.get(2)?,
                        origin: row.get(3)?,
                        departs: row.get(4)?,
                        destination: row.get(5)?,
                        arrives: row.get(6)?,
                    })
                })
                .context("Failed to query departures")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read departure rows")?;
            pairs
        };

        debug!(
            "{} stop pair(s) between {:?} and {:?}",
            pairs.len(),
            origin,
            destination
        );

        let next = pairs
            .into_iter()
            .filter_map(|pair| {
                let departs = parse_or_warn(&pair.departs, pair.train_id)?;
                let arrives = parse_or_warn(&pair.arrives, pair.train_id)?;
                Some((pair, departs, arrives))
            })
            .filter(|(_, departs, arrives)| departs < arrives && *departs > after)
            .min_by(|(a, a_departs, _), (b, b_departs, _)| {
                a_departs
                    .cmp(b_departs)
                    .then_with(|| a.train_id.cmp(&b.train_id))
            })
            .map(|(pair, departs, arrives)| Departure {
                train_name: pair.train_name,
                train_number: pair.train_number,
                origin: pair.origin,
                departs,
                destination: pair.destination,
                arrives,
            });

        Ok(next)
    }
}

fn parse_or_warn(value: &str, train_id: i64) -> Option<NaiveTime> {
    match clock::parse_stored(value) {
        Ok(time) => Some(time),
        Err(e) => {
            warn!("Skipping stop of train {}: {:#}", train_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::fixtures::add_train;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn central_line() -> ScheduleStore {
        let store = ScheduleStore::open_in_memory().unwrap();
        add_train(
            &store,
            "Morning Express",
            "101",
            &[
                ("Central", "CEN", "07:18"),
                ("Midway", "MID", "07:35"),
                ("North", "NTH", "07:52"),
            ],
        )
        .await;
        store
    }

    #[tokio::test]
    async fn test_finds_single_future_departure() {
        let store = central_line().await;
        let dep = store
            .find_next_departure("Central", "North", hm(6, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            dep,
            Departure {
                train_name: "Morning Express".to_string(),
                train_number: "101".to_string(),
                origin: "Central".to_string(),
                departs: hm(7, 18),
                destination: "North".to_string(),
                arrives: hm(7, 52),
            }
        );
    }

    #[tokio::test]
    async fn test_no_match_after_last_departure() {
        let store = central_line().await;
        let dep = store
            .find_next_departure("Central", "North", hm(23, 0))
            .await
            .unwrap();
        assert!(dep.is_none());
    }

    #[tokio::test]
    async fn test_departure_at_boundary_is_excluded() {
        let store = central_line().await;
        let dep = store
            .find_next_departure("Central", "North", hm(7, 18))
            .await
            .unwrap();
        assert!(dep.is_none());
    }

    #[tokio::test]
    async fn test_short_names_match() {
        let store = central_line().await;
        let dep = store
            .find_next_departure("CEN", "NTH", hm(6, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dep.origin, "Central");
        assert_eq!(dep.destination, "North");
    }

    #[tokio::test]
    async fn test_matching_is_case_sensitive() {
        let store = central_line().await;
        let dep = store
            .find_next_departure("central", "north", hm(6, 0))
            .await
            .unwrap();
        assert!(dep.is_none());
    }

    #[tokio::test]
    async fn test_wrong_direction_not_returned() {
        let store = central_line().await;
        let dep = store
            .find_next_departure("North", "Central", hm(6, 0))
            .await
            .unwrap();
        assert!(dep.is_none());
    }

    #[tokio::test]
    async fn test_earliest_qualifying_departure_wins() {
        let store = central_line().await;
        add_train(
            &store,
            "Commuter",
            "205",
            &[("Central", "CEN", "17:04"), ("North", "NTH", "17:40")],
        )
        .await;
        add_train(
            &store,
            "Early Bird",
            "7",
            &[("Central", "CEN", "06:39"), ("North", "NTH", "07:10")],
        )
        .await;
        add_train(
            &store,
            "Late Local",
            "330",
            &[("Central", "CEN", "9:42"), ("North", "NTH", "10:20")],
        )
        .await;

        let dep = store
            .find_next_departure("Central", "North", hm(6, 45))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dep.train_number, "101");
        assert_eq!(dep.departs, hm(7, 18));

        // Unpadded stored hours still order numerically
        let dep = store
            .find_next_departure("Central", "North", hm(8, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dep.train_number, "330");
        assert_eq!(dep.departs, hm(9, 42));
    }

    #[tokio::test]
    async fn test_never_returns_past_departure() {
        let store = central_line().await;
        add_train(
            &store,
            "Commuter",
            "205",
            &[("Central", "CEN", "17:04"), ("North", "NTH", "17:40")],
        )
        .await;

        for now in [hm(0, 0), hm(7, 17), hm(7, 18), hm(12, 0), hm(17, 3), hm(17, 4)] {
            if let Some(dep) = store
                .find_next_departure("Central", "North", now)
                .await
                .unwrap()
            {
                assert!(dep.departs > now, "{} departs before {}", dep.departs, now);
            }
        }
    }

    #[tokio::test]
    async fn test_repeated_lookup_is_deterministic() {
        let store = central_line().await;
        let first = store
            .find_next_departure("CEN", "North", hm(6, 0))
            .await
            .unwrap();
        let second = store
            .find_next_departure("CEN", "North", hm(6, 0))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_user_input_is_bound_not_interpolated() {
        let store = central_line().await;
        let dep = store
            .find_next_departure("Central' OR '1'='1", "North", hm(6, 0))
            .await
            .unwrap();
        assert!(dep.is_none());
    }

    #[tokio::test]
    async fn test_malformed_stop_time_is_skipped() {
        let store = central_line().await;
        add_train(
            &store,
            "Broken",
            "999",
            &[("Central", "CEN", "soon"), ("North", "NTH", "08:00")],
        )
        .await;

        let dep = store
            .find_next_departure("Central", "North", hm(6, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dep.train_number, "101");
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let store = central_line().await;
        {
            let conn = store.connection();
            let conn = conn.lock().await;
            conn.execute_batch("DROP TABLE times;").unwrap();
        }
        assert!(store
            .find_next_departure("Central", "North", hm(6, 0))
            .await
            .is_err());
    }
}
