use crate::Database;
use crate::models::{
    ChannelRow, ElsterAccountRow, MessageRow, PostRow, ProfileRow, StripeAccountRow,
    SubmissionRow, ThreadRow, TopicRow, TransactionRow, UserRow,
};
use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str, role: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, role),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn touch_last_login(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET last_login_at = datetime('now') WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    pub fn set_subscription_status(&self, user_id: &str, status: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET subscription_status = ?2 WHERE id = ?1",
                (user_id, status),
            )?;
            Ok(())
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, company_name, vat_id, address, country
                 FROM user_profiles WHERE user_id = ?1",
            )?;
            stmt.query_row([user_id], |row| {
                Ok(ProfileRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    company_name: row.get(2)?,
                    vat_id: row.get(3)?,
                    address: row.get(4)?,
                    country: row.get(5)?,
                })
            })
            .optional()
        })
    }

    pub fn upsert_profile(
        &self,
        user_id: &str,
        company_name: &str,
        vat_id: &str,
        address: &str,
        country: &str,
    ) -> Result<ProfileRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_profiles (id, user_id, company_name, vat_id, address, country)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id) DO UPDATE SET
                     company_name = excluded.company_name,
                     vat_id = excluded.vat_id,
                     address = excluded.address,
                     country = excluded.country,
                     updated_at = datetime('now')",
                (
                    Uuid::new_v4().to_string(),
                    user_id,
                    company_name,
                    vat_id,
                    address,
                    country,
                ),
            )?;
            Ok(())
        })?;
        self.get_profile(user_id)?
            .ok_or_else(|| anyhow::anyhow!("Profile vanished after upsert for user {}", user_id))
    }

    // -- Conversation threads --
    //
    // Every module chat handler goes through get_or_create_thread and
    // append_message, so chat history is always reconstructable per module
    // regardless of which backend served the reply.

    /// Most-recently-updated thread for (user, module); created when absent.
    pub fn get_or_create_thread(&self, user_id: &str, module: &str) -> Result<ThreadRow> {
        self.with_conn_mut(|conn| {
            let existing = query_latest_thread(conn, user_id, module)?;
            if let Some(thread) = existing {
                return Ok(thread);
            }

            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO conversation_threads (id, user_id, module) VALUES (?1, ?2, ?3)",
                (&id, user_id, module),
            )?;
            query_latest_thread(conn, user_id, module)?
                .ok_or_else(|| anyhow::anyhow!("Thread vanished after insert: {}", id))
        })
    }

    pub fn latest_thread(&self, user_id: &str, module: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| query_latest_thread(conn, user_id, module))
    }

    pub fn list_threads(&self, user_id: &str) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, module, created_at, updated_at
                 FROM conversation_threads
                 WHERE user_id = ?1
                 ORDER BY updated_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], thread_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Append one message and bump the thread's updated_at.
    pub fn append_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
        metadata: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, thread_id, role, content, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (&id, thread_id, role, content, metadata),
            )?;
            conn.execute(
                "UPDATE conversation_threads SET updated_at = datetime('now') WHERE id = ?1",
                [thread_id],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// All messages for a thread, in creation order.
    pub fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, role, content, metadata, created_at
                 FROM messages
                 WHERE thread_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([thread_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Last `limit` messages of a thread, oldest first (prompt context window).
    pub fn get_recent_messages(&self, thread_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, role, content, metadata, created_at
                 FROM messages
                 WHERE thread_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let mut rows = stmt
                .query_map(rusqlite::params![thread_id, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }

    // -- Stripe accounts --

    pub fn get_stripe_account(&self, user_id: &str) -> Result<Option<StripeAccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, api_key, is_connected FROM user_stripe_accounts WHERE user_id = ?1",
            )?;
            stmt.query_row([user_id], |row| {
                Ok(StripeAccountRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    api_key: row.get(2)?,
                    is_connected: row.get(3)?,
                })
            })
            .optional()
        })
    }

    pub fn upsert_stripe_account(&self, user_id: &str, api_key: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_stripe_accounts (id, user_id, api_key, is_connected)
                 VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT(user_id) DO UPDATE SET
                     api_key = excluded.api_key,
                     is_connected = 1,
                     updated_at = datetime('now')",
                (Uuid::new_v4().to_string(), user_id, api_key),
            )?;
            Ok(())
        })
    }

    // -- ELSTER accounts --

    pub fn get_elster_account(&self, user_id: &str) -> Result<Option<ElsterAccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, tax_id, is_connected, frequency, full_name,
                        street_address, city, postal_code, bank_name, iban
                 FROM user_elster_accounts WHERE user_id = ?1",
            )?;
            stmt.query_row([user_id], |row| {
                Ok(ElsterAccountRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    tax_id: row.get(2)?,
                    is_connected: row.get(3)?,
                    frequency: row.get(4)?,
                    full_name: row.get(5)?,
                    street_address: row.get(6)?,
                    city: row.get(7)?,
                    postal_code: row.get(8)?,
                    bank_name: row.get(9)?,
                    iban: row.get(10)?,
                })
            })
            .optional()
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn upsert_elster_account(
        &self,
        user_id: &str,
        tax_id: &str,
        full_name: Option<&str>,
        street_address: Option<&str>,
        city: Option<&str>,
        postal_code: Option<&str>,
        bank_name: Option<&str>,
        iban: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_elster_accounts
                     (id, user_id, tax_id, is_connected, full_name, street_address,
                      city, postal_code, bank_name, iban)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(user_id) DO UPDATE SET
                     tax_id = excluded.tax_id,
                     is_connected = 1,
                     full_name = COALESCE(excluded.full_name, full_name),
                     street_address = COALESCE(excluded.street_address, street_address),
                     city = COALESCE(excluded.city, city),
                     postal_code = COALESCE(excluded.postal_code, postal_code),
                     bank_name = COALESCE(excluded.bank_name, bank_name),
                     iban = COALESCE(excluded.iban, iban),
                     updated_at = datetime('now')",
                (
                    Uuid::new_v4().to_string(),
                    user_id,
                    tax_id,
                    full_name,
                    street_address,
                    city,
                    postal_code,
                    bank_name,
                    iban,
                ),
            )?;
            Ok(())
        })
    }

    pub fn set_elster_frequency(&self, user_id: &str, frequency: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE user_elster_accounts
                 SET frequency = ?2, updated_at = datetime('now')
                 WHERE user_id = ?1",
                (user_id, frequency),
            )?;
            Ok(changed > 0)
        })
    }

    // -- Transactions --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_transaction(
        &self,
        id: &str,
        user_id: &str,
        stripe_id: Option<&str>,
        date: &str,
        description: &str,
        amount: f64,
        currency: &str,
        tax_amount: Option<f64>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO transactions (id, user_id, stripe_id, date, description, amount, currency, tax_amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                (id, user_id, stripe_id, date, description, amount, currency, tax_amount),
            )?;
            Ok(())
        })
    }

    pub fn list_transactions(
        &self,
        user_id: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<TransactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, stripe_id, date, description, amount, currency,
                        status, tax_amount, is_expense_claimed
                 FROM transactions
                 WHERE user_id = ?1
                   AND (?2 IS NULL OR date >= ?2)
                   AND (?3 IS NULL OR date <= ?3)
                 ORDER BY date DESC",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id, start_date, end_date],
                    transaction_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_transactions_by_ids(&self, user_id: &str, ids: &[String]) -> Result<Vec<TransactionRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let placeholders: Vec<String> = (2..=ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, user_id, stripe_id, date, description, amount, currency,
                        status, tax_amount, is_expense_claimed
                 FROM transactions
                 WHERE user_id = ?1 AND id IN ({})",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&user_id as &dyn rusqlite::types::ToSql];
            params.extend(ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));
            let rows = stmt
                .query_map(params.as_slice(), transaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_expense_claimed(&self, user_id: &str, transaction_id: &str) -> Result<Option<TransactionRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE transactions SET is_expense_claimed = 1 WHERE id = ?1 AND user_id = ?2",
                (transaction_id, user_id),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let mut stmt = conn.prepare(
                "SELECT id, user_id, stripe_id, date, description, amount, currency,
                        status, tax_amount, is_expense_claimed
                 FROM transactions WHERE id = ?1",
            )?;
            stmt.query_row([transaction_id], transaction_from_row).optional()
        })
    }

    // -- Submissions --

    pub fn find_submission_by_period(&self, user_id: &str, period: &str) -> Result<Option<SubmissionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, timestamp, period, status
                 FROM submissions WHERE user_id = ?1 AND period = ?2",
            )?;
            stmt.query_row((user_id, period), submission_from_row).optional()
        })
    }

    /// Create a submission and link its transactions in one DB transaction.
    pub fn create_submission(
        &self,
        id: &str,
        user_id: &str,
        period: &str,
        status: &str,
        transaction_ids: &[String],
    ) -> Result<SubmissionRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO submissions (id, user_id, period, status) VALUES (?1, ?2, ?3, ?4)",
                (id, user_id, period, status),
            )?;
            for transaction_id in transaction_ids {
                tx.execute(
                    "INSERT INTO submission_transactions (submission_id, transaction_id) VALUES (?1, ?2)",
                    (id, transaction_id),
                )?;
            }
            tx.commit()?;
            Ok(())
        })?;
        self.get_submission(user_id, id)?
            .map(|(row, _)| row)
            .ok_or_else(|| anyhow::anyhow!("Submission vanished after insert: {}", id))
    }

    pub fn get_submission(&self, user_id: &str, id: &str) -> Result<Option<(SubmissionRow, Vec<String>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, timestamp, period, status
                 FROM submissions WHERE id = ?1 AND user_id = ?2",
            )?;
            let row = stmt.query_row((id, user_id), submission_from_row).optional()?;
            match row {
                Some(sub) => {
                    let ids = query_submission_transaction_ids(conn, &sub.id)?;
                    Ok(Some((sub, ids)))
                }
                None => Ok(None),
            }
        })
    }

    pub fn list_submissions(&self, user_id: &str) -> Result<Vec<(SubmissionRow, Vec<String>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, timestamp, period, status
                 FROM submissions WHERE user_id = ?1
                 ORDER BY timestamp DESC, rowid DESC",
            )?;
            let subs = stmt
                .query_map([user_id], submission_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut out = Vec::with_capacity(subs.len());
            for sub in subs {
                let ids = query_submission_transaction_ids(conn, &sub.id)?;
                out.push((sub, ids));
            }
            Ok(out)
        })
    }

    // -- Marketing collections --

    pub fn list_channels(&self, user_id: &str) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, platform, url, api_credentials
                 FROM marketing_channels WHERE user_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        platform: row.get(2)?,
                        url: row.get(3)?,
                        api_credentials: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn insert_channel(
        &self,
        id: &str,
        user_id: &str,
        platform: &str,
        url: &str,
        api_credentials: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO marketing_channels (id, user_id, platform, url, api_credentials)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, platform, url, api_credentials),
            )?;
            Ok(())
        })
    }

    pub fn delete_channel(&self, user_id: &str, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM marketing_channels WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn list_topics(&self, user_id: &str) -> Result<Vec<TopicRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, topic FROM marketing_topics
                 WHERE user_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(TopicRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        topic: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn insert_topic(&self, id: &str, user_id: &str, topic: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO marketing_topics (id, user_id, topic) VALUES (?1, ?2, ?3)",
                (id, user_id, topic),
            )?;
            Ok(())
        })
    }

    pub fn delete_topic(&self, user_id: &str, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM marketing_topics WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn list_posts(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, channel_id, topic_id, content, status, scheduled_at
                 FROM marketing_posts WHERE user_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(PostRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        channel_id: row.get(2)?,
                        topic_id: row.get(3)?,
                        content: row.get(4)?,
                        status: row.get(5)?,
                        scheduled_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_post(
        &self,
        id: &str,
        user_id: &str,
        channel_id: Option<&str>,
        topic_id: Option<&str>,
        content: &str,
        scheduled_at: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO marketing_posts (id, user_id, channel_id, topic_id, content, scheduled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, user_id, channel_id, topic_id, content, scheduled_at),
            )?;
            Ok(())
        })
    }

    pub fn delete_post(&self, user_id: &str, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM marketing_posts WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // column is always a compile-time constant ("id" or "email")
    let sql = format!(
        "SELECT id, email, password_hash, role, subscription_status, last_login_at, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            role: row.get(3)?,
            subscription_status: row.get(4)?,
            last_login_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    })
    .optional()
}

fn query_latest_thread(conn: &Connection, user_id: &str, module: &str) -> Result<Option<ThreadRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, module, created_at, updated_at
         FROM conversation_threads
         WHERE user_id = ?1 AND module = ?2
         ORDER BY updated_at DESC, rowid DESC
         LIMIT 1",
    )?;
    stmt.query_row((user_id, module), thread_from_row).optional()
}

fn query_submission_transaction_ids(conn: &Connection, submission_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT transaction_id FROM submission_transactions WHERE submission_id = ?1",
    )?;
    let ids = stmt
        .query_map([submission_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn thread_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ThreadRow, rusqlite::Error> {
    Ok(ThreadRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        module: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        metadata: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn transaction_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<TransactionRow, rusqlite::Error> {
    Ok(TransactionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        stripe_id: row.get(2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        currency: row.get(6)?,
        status: row.get(7)?,
        tax_amount: row.get(8)?,
        is_expense_claimed: row.get(9)?,
    })
}

fn submission_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<SubmissionRow, rusqlite::Error> {
    Ok(SubmissionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        timestamp: row.get(2)?,
        period: row.get(3)?,
        status: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4().to_string();
        db.create_user(&user_id, "a@b.com", "hash", "user").unwrap();
        (db, user_id)
    }

    #[test]
    fn thread_lookup_is_idempotent() {
        let (db, user_id) = db_with_user();

        let first = db.get_or_create_thread(&user_id, "accounting").unwrap();
        let second = db.get_or_create_thread(&user_id, "accounting").unwrap();
        assert_eq!(first.id, second.id);

        // Different module gets its own thread
        let other = db.get_or_create_thread(&user_id, "marketing").unwrap();
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn messages_keep_creation_order() {
        let (db, user_id) = db_with_user();
        let thread = db.get_or_create_thread(&user_id, "secretary").unwrap();

        for i in 0..5 {
            db.append_message(&thread.id, "user", &format!("question {}", i), None)
                .unwrap();
            db.append_message(&thread.id, "ai", &format!("answer {}", i), None)
                .unwrap();
        }

        let messages = db.get_thread_messages(&thread.id).unwrap();
        assert_eq!(messages.len(), 10);
        for (i, msg) in messages.iter().enumerate() {
            let expected_role = if i % 2 == 0 { "user" } else { "ai" };
            assert_eq!(msg.role, expected_role);
            assert!(msg.content.ends_with(&format!("{}", i / 2)));
        }
    }

    #[test]
    fn recent_messages_window_is_oldest_first() {
        let (db, user_id) = db_with_user();
        let thread = db.get_or_create_thread(&user_id, "accounting").unwrap();
        for i in 0..6 {
            db.append_message(&thread.id, "user", &format!("m{}", i), None).unwrap();
        }

        let recent = db.get_recent_messages(&thread.id, 4).unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(recent[3].content, "m5");
    }

    #[test]
    fn submission_roundtrip_preserves_transaction_set() {
        let (db, user_id) = db_with_user();
        let t1 = Uuid::new_v4().to_string();
        let t2 = Uuid::new_v4().to_string();
        db.insert_transaction(&t1, &user_id, None, "2024-04-01", "Invoice 1", 100.0, "EUR", Some(19.0))
            .unwrap();
        db.insert_transaction(&t2, &user_id, None, "2024-05-12", "Invoice 2", 50.0, "EUR", Some(9.5))
            .unwrap();

        let sub_id = Uuid::new_v4().to_string();
        let ids = vec![t1.clone(), t2.clone()];
        db.create_submission(&sub_id, &user_id, "Q2 2024", "processing", &ids)
            .unwrap();

        let (sub, got_ids) = db.get_submission(&user_id, &sub_id).unwrap().unwrap();
        assert_eq!(sub.period, "Q2 2024");
        let mut got = got_ids.clone();
        let mut want = ids.clone();
        got.sort();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn duplicate_period_is_rejected_by_schema() {
        let (db, user_id) = db_with_user();
        let first = Uuid::new_v4().to_string();
        db.create_submission(&first, &user_id, "Q1 2025", "submitted", &[]).unwrap();
        let second = Uuid::new_v4().to_string();
        assert!(db.create_submission(&second, &user_id, "Q1 2025", "submitted", &[]).is_err());
    }

    #[test]
    fn profile_upsert_overwrites() {
        let (db, user_id) = db_with_user();
        db.upsert_profile(&user_id, "Alt GmbH", "DE1", "Old St 1", "Germany").unwrap();
        let updated = db
            .upsert_profile(&user_id, "Neu GmbH", "DE2", "New St 2", "Germany")
            .unwrap();
        assert_eq!(updated.company_name, "Neu GmbH");
        assert_eq!(db.get_profile(&user_id).unwrap().unwrap().vat_id, "DE2");
    }
}
