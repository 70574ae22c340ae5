use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Logged { total_for_day: usize },
    AlreadyLogged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { remaining_for_day: usize },
    NoLogsForDate,
    NotInLog,
}

/// Per-user, per-day set of meal ids.
#[async_trait]
pub trait MealLogStore: Send + Sync {
    async fn day(&self, user_id: Uuid, date: Date) -> anyhow::Result<Vec<String>>;
    async fn all(&self, user_id: Uuid) -> anyhow::Result<BTreeMap<Date, Vec<String>>>;
    /// Inserts unless the meal is already logged for that day.
    async fn log(&self, user_id: Uuid, date: Date, meal_id: &str) -> anyhow::Result<LogOutcome>;
    async fn remove(&self, user_id: Uuid, date: Date, meal_id: &str)
        -> anyhow::Result<RemoveOutcome>;
}

#[derive(Clone)]
pub struct PgMealLog {
    db: PgPool,
}

impl PgMealLog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn count_day(&self, user_id: Uuid, date: Date) -> anyhow::Result<usize> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM meal_logs WHERE user_id = $1 AND log_date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.db)
        .await?;
        Ok(n as usize)
    }
}

#[async_trait]
impl MealLogStore for PgMealLog {
    async fn day(&self, user_id: Uuid, date: Date) -> anyhow::Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT meal_id
            FROM meal_logs
            WHERE user_id = $1 AND log_date = $2
            ORDER BY logged_at ASC
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }

    async fn all(&self, user_id: Uuid) -> anyhow::Result<BTreeMap<Date, Vec<String>>> {
        let rows = sqlx::query_as::<_, (Date, String)>(
            r#"
            SELECT log_date, meal_id
            FROM meal_logs
            WHERE user_id = $1
            ORDER BY log_date ASC, logged_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let mut logs: BTreeMap<Date, Vec<String>> = BTreeMap::new();
        for (date, meal_id) in rows {
            logs.entry(date).or_default().push(meal_id);
        }
        Ok(logs)
    }

    async fn log(&self, user_id: Uuid, date: Date, meal_id: &str) -> anyhow::Result<LogOutcome> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO meal_logs (user_id, log_date, meal_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, log_date, meal_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(meal_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Ok(LogOutcome::AlreadyLogged);
        }
        Ok(LogOutcome::Logged {
            total_for_day: self.count_day(user_id, date).await?,
        })
    }

    async fn remove(
        &self,
        user_id: Uuid,
        date: Date,
        meal_id: &str,
    ) -> anyhow::Result<RemoveOutcome> {
        let deleted = sqlx::query(
            "DELETE FROM meal_logs WHERE user_id = $1 AND log_date = $2 AND meal_id = $3",
        )
        .bind(user_id)
        .bind(date)
        .bind(meal_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        let remaining = self.count_day(user_id, date).await?;
        Ok(match (deleted, remaining) {
            (0, 0) => RemoveOutcome::NoLogsForDate,
            (0, _) => RemoveOutcome::NotInLog,
            _ => RemoveOutcome::Removed {
                remaining_for_day: remaining,
            },
        })
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use super::*;

    /// Same semantics as the Postgres log, kept in a map.
    #[derive(Default)]
    pub struct MemoryMealLog {
        logs: Mutex<BTreeMap<(Uuid, Date), Vec<String>>>,
    }

    #[async_trait]
    impl MealLogStore for MemoryMealLog {
        async fn day(&self, user_id: Uuid, date: Date) -> anyhow::Result<Vec<String>> {
            Ok(self
                .logs
                .lock()
                .unwrap()
                .get(&(user_id, date))
                .cloned()
                .unwrap_or_default())
        }

        async fn all(&self, user_id: Uuid) -> anyhow::Result<BTreeMap<Date, Vec<String>>> {
            Ok(self
                .logs
                .lock()
                .unwrap()
                .iter()
                .filter(|((u, _), ids)| *u == user_id && !ids.is_empty())
                .map(|((_, d), ids)| (*d, ids.clone()))
                .collect())
        }

        async fn log(
            &self,
            user_id: Uuid,
            date: Date,
            meal_id: &str,
        ) -> anyhow::Result<LogOutcome> {
            let mut logs = self.logs.lock().unwrap();
            let day = logs.entry((user_id, date)).or_default();
            if day.iter().any(|m| m == meal_id) {
                return Ok(LogOutcome::AlreadyLogged);
            }
            day.push(meal_id.to_string());
            Ok(LogOutcome::Logged {
                total_for_day: day.len(),
            })
        }

        async fn remove(
            &self,
            user_id: Uuid,
            date: Date,
            meal_id: &str,
        ) -> anyhow::Result<RemoveOutcome> {
            let mut logs = self.logs.lock().unwrap();
            let Some(day) = logs.get_mut(&(user_id, date)).filter(|d| !d.is_empty()) else {
                return Ok(RemoveOutcome::NoLogsForDate);
            };
            let Some(pos) = day.iter().position(|m| m == meal_id) else {
                return Ok(RemoveOutcome::NotInLog);
            };
            day.remove(pos);
            let remaining = day.len();
            if remaining == 0 {
                logs.remove(&(user_id, date));
            }
            Ok(RemoveOutcome::Removed {
                remaining_for_day: remaining,
            })
        }
    }

    mod tests {
        use time::macros::date;

        use super::*;

        #[tokio::test]
        async fn logging_twice_is_a_no_op() {
            let store = MemoryMealLog::default();
            let user = Uuid::new_v4();
            let d = date!(2024 - 03 - 01);
            assert_eq!(
                store.log(user, d, "m1").await.unwrap(),
                LogOutcome::Logged { total_for_day: 1 }
            );
            assert_eq!(store.log(user, d, "m1").await.unwrap(), LogOutcome::AlreadyLogged);
            assert_eq!(store.day(user, d).await.unwrap(), vec!["m1"]);
        }

        #[tokio::test]
        async fn removing_distinguishes_empty_day_from_missing_meal() {
            let store = MemoryMealLog::default();
            let user = Uuid::new_v4();
            let d = date!(2024 - 03 - 01);
            assert_eq!(
                store.remove(user, d, "m1").await.unwrap(),
                RemoveOutcome::NoLogsForDate
            );
            store.log(user, d, "m1").await.unwrap();
            assert_eq!(store.remove(user, d, "m2").await.unwrap(), RemoveOutcome::NotInLog);
            assert_eq!(store.day(user, d).await.unwrap(), vec!["m1"]);
            assert_eq!(
                store.remove(user, d, "m1").await.unwrap(),
                RemoveOutcome::Removed { remaining_for_day: 0 }
            );
            assert!(store.all(user).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn logs_are_scoped_per_user_and_day() {
            let store = MemoryMealLog::default();
            let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
            let d1 = date!(2024 - 03 - 01);
            let d2 = date!(2024 - 03 - 02);
            store.log(a, d1, "m1").await.unwrap();
            store.log(a, d2, "m1").await.unwrap();
            store.log(b, d1, "m2").await.unwrap();
            let all = store.all(a).await.unwrap();
            assert_eq!(all.len(), 2);
            assert_eq!(all[&d1], vec!["m1"]);
            assert_eq!(store.day(b, d1).await.unwrap(), vec!["m2"]);
        }
    }
}
