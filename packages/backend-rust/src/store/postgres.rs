use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row};

use crate::db::DatabaseProxy;
use crate::store::{
    counter_from_db, AccuracyStats, AccuracyStore, Card, CardCatalog, CardId, Group, GroupId,
    GroupMembership, StoreError, UserId, MAX_BATCH_SIZE,
};

#[async_trait]
impl CardCatalog for DatabaseProxy {
    async fn list_all_card_ids(&self) -> Result<HashSet<CardId>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar(r#"SELECT "uid" FROM "flashcards""#)
            .fetch_all(self.pool())
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn card_exists(&self, card_id: CardId) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM "flashcards" WHERE "uid" = $1)"#)
                .bind(card_id)
                .fetch_one(self.pool())
                .await?;
        Ok(exists)
    }

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>, StoreError> {
        let row = sqlx::query(
            r#"SELECT "uid", "gloss", "definition", "video" FROM "flashcards" WHERE "uid" = $1"#,
        )
        .bind(card_id)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Card {
            id: row.try_get("uid")?,
            gloss: row.try_get("gloss")?,
            definition: row.try_get("definition")?,
            video: row.try_get("video")?,
        }))
    }
}

#[async_trait]
impl GroupMembership for DatabaseProxy {
    async fn members_of_groups(
        &self,
        group_ids: &HashSet<GroupId>,
    ) -> Result<HashSet<CardId>, StoreError> {
        if group_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids: Vec<GroupId> = group_ids.iter().copied().collect();
        let members: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT ig."flashcard_uid"
            FROM "in_group" ig
            JOIN "flashcards" f ON ig."flashcard_uid" = f."uid"
            WHERE ig."group_uid" = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await?;

        Ok(members.into_iter().collect())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT g."uid", g."name", g."owner_uid", u."name" AS "owner_name"
            FROM "groups" g
            LEFT JOIN "users" u ON g."owner_uid" = u."uid"
            ORDER BY g."name" ASC, g."uid" ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<Group, StoreError> {
                Ok(Group {
                    id: row.try_get("uid")?,
                    name: row.try_get("name")?,
                    owner_id: row.try_get("owner_uid")?,
                    owner_name: row.try_get("owner_name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AccuracyStore for DatabaseProxy {
    async fn get(
        &self,
        user_id: UserId,
        card_id: CardId,
    ) -> Result<Option<AccuracyStats>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT "correct", "total"
            FROM "accuracy"
            WHERE "user_uid" = $1 AND "flashcard_uid" = $2
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| map_counters(&row, user_id, card_id))
            .transpose()
    }

    async fn get_all(
        &self,
        user_id: UserId,
        card_ids: &HashSet<CardId>,
    ) -> Result<HashMap<CardId, AccuracyStats>, StoreError> {
        let mut out = HashMap::with_capacity(card_ids.len());
        if card_ids.is_empty() {
            return Ok(out);
        }

        let ids: Vec<CardId> = card_ids.iter().copied().collect();
        for chunk in ids.chunks(MAX_BATCH_SIZE) {
            let mut qb = QueryBuilder::<sqlx::Postgres>::new(
                r#"SELECT "flashcard_uid", "correct", "total" FROM "accuracy" WHERE "user_uid" = "#,
            );
            qb.push_bind(user_id);
            qb.push(r#" AND "flashcard_uid" IN ("#);
            {
                let mut sep = qb.separated(", ");
                for id in chunk {
                    sep.push_bind(*id);
                }
            }
            qb.push(")");

            let rows = qb.build().fetch_all(self.pool()).await?;
            for row in &rows {
                let card_id: CardId = row.try_get("flashcard_uid")?;
                out.insert(card_id, map_counters(row, user_id, card_id)?);
            }
        }

        Ok(out)
    }

    async fn create_missing(
        &self,
        user_id: UserId,
        card_ids: &HashSet<CardId>,
    ) -> Result<u64, StoreError> {
        if card_ids.is_empty() {
            return Ok(0);
        }

        // Sorted so concurrent batches take row locks in the same order.
        let mut ids: Vec<CardId> = card_ids.iter().copied().collect();
        ids.sort_unstable();

        let mut tx = self.pool().begin().await?;
        let mut created = 0;

        // Filtered through "flashcards" so a card deleted after the pool was
        // resolved is skipped instead of failing the foreign key for the batch.
        for chunk in ids.chunks(MAX_BATCH_SIZE) {
            let result = sqlx::query(
                r#"
                INSERT INTO "accuracy" ("user_uid", "flashcard_uid", "correct", "total")
                SELECT $1, f."uid", 0, 0
                FROM "flashcards" f
                WHERE f."uid" = ANY($2)
                ORDER BY f."uid"
                FOR KEY SHARE
                ON CONFLICT ("user_uid", "flashcard_uid") DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(chunk)
            .execute(&mut *tx)
            .await?;
            created += result.rows_affected();
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn increment_attempt(
        &self,
        user_id: UserId,
        card_id: CardId,
        was_correct: bool,
    ) -> Result<Option<AccuracyStats>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE "accuracy"
            SET "correct" = "correct" + $3, "total" = "total" + 1
            WHERE "user_uid" = $1 AND "flashcard_uid" = $2
            RETURNING "correct", "total"
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .bind(i32::from(was_correct))
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| map_counters(&row, user_id, card_id))
            .transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let timeout = self.health_check().timeout;
        match tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(self.pool())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(StoreError::Sqlx(err)),
            Err(_) => Err(StoreError::Unavailable("health check timed out".to_string())),
        }
    }
}

fn map_counters(
    row: &sqlx::postgres::PgRow,
    user_id: UserId,
    card_id: CardId,
) -> Result<AccuracyStats, StoreError> {
    let correct: i32 = row.try_get("correct")?;
    let total: i32 = row.try_get("total")?;
    Ok(AccuracyStats::new(
        counter_from_db(user_id, card_id, correct)?,
        counter_from_db(user_id, card_id, total)?,
    ))
}
