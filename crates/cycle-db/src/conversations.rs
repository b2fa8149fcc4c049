use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::{ChatRow, ConversationRow, LastChatRow};
use crate::{Database, NOW};

/// Order-independent key for a pair of participants: the two ids sorted and
/// joined with `_`.
pub fn participants_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

impl Database {
    // -- Conversations --

    /// Return the conversation between `a` and `b`, creating it with `new_id`
    /// if it does not exist. The unique composite key makes this a single
    /// atomic upsert.
    pub fn get_or_create_conversation(&self, new_id: &str, a: &str, b: &str) -> Result<String> {
        let key = participants_key(a, b);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, participants_id, participant_a, participant_b)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(participants_id) DO NOTHING",
                (new_id, &key, a, b),
            )?;
            let id = conn.query_row(
                "SELECT id FROM conversations WHERE participants_id = ?1",
                [&key],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, participants_id, participant_a, participant_b FROM conversations WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(ConversationRow {
                            id: row.get(0)?,
                            participants_id: row.get(1)?,
                            participant_a: row.get(2)?,
                            participant_b: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Append a chat message and return it as stored.
    pub fn insert_chat(&self, id: &str, conversation_id: &str, sent_by: &str, content: &str) -> Result<ChatRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chats (id, conversation_id, sent_by, content) VALUES (?1, ?2, ?3, ?4)",
                (id, conversation_id, sent_by, content),
            )?;
            tx.execute(
                &format!("UPDATE conversations SET updated_at = {NOW} WHERE id = ?1"),
                [conversation_id],
            )?;
            let chat = query_chats(&tx, "c.id = ?1", id)?
                .pop()
                .ok_or_else(|| anyhow::anyhow!("Chat {} vanished after insert", id))?;
            tx.commit()?;
            Ok(chat)
        })
    }

    /// All messages of a conversation, oldest first, with sender details
    /// joined in (no N+1).
    pub fn get_chats(&self, conversation_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| query_chats(conn, "c.conversation_id = ?1", conversation_id))
    }

    /// Mark every message `sender_id` sent in the conversation as viewed.
    pub fn mark_chats_viewed(&self, conversation_id: &str, sender_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE chats SET viewed = 1 WHERE conversation_id = ?1 AND sent_by = ?2 AND viewed = 0",
                (conversation_id, sender_id),
            )?;
            Ok(updated)
        })
    }

    /// One entry per conversation of `user_id` that has at least one message:
    /// the peer, the last message and how many of the peer's messages are
    /// still unread. Most recent activity first.
    pub fn get_last_chats(&self, user_id: &str) -> Result<Vec<LastChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cv.id, u.id, u.name, u.avatar_url, last.content, last.timestamp,
                        (SELECT COUNT(*) FROM chats unread
                          WHERE unread.conversation_id = cv.id
                            AND unread.viewed = 0
                            AND unread.sent_by != ?1)
                 FROM conversations cv
                 JOIN users u
                   ON u.id = CASE WHEN cv.participant_a = ?1 THEN cv.participant_b ELSE cv.participant_a END
                 JOIN chats last
                   ON last.seq = (SELECT MAX(seq) FROM chats WHERE conversation_id = cv.id)
                 WHERE cv.participant_a = ?1 OR cv.participant_b = ?1
                 ORDER BY last.seq DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(LastChatRow {
                        conversation_id: row.get(0)?,
                        peer_id: row.get(1)?,
                        peer_name: row.get(2)?,
                        peer_avatar: row.get(3)?,
                        last_message: row.get(4)?,
                        timestamp: row.get(5)?,
                        unread_count: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_chats(conn: &Connection, filter: &str, value: &str) -> Result<Vec<ChatRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT c.id, c.conversation_id, c.sent_by, u.name, u.avatar_url, c.content, c.timestamp, c.viewed
         FROM chats c
         LEFT JOIN users u ON c.sent_by = u.id
         WHERE {filter}
         ORDER BY c.seq"
    ))?;

    let rows = stmt
        .query_map([value], |row| {
            Ok(ChatRow {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                sent_by: row.get(2)?,
                sender_name: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
                sender_avatar: row.get(4)?,
                content: row.get(5)?,
                timestamp: row.get(6)?,
                viewed: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use uuid::Uuid;

    fn seed_user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&NewUser {
            id: &id,
            name,
            email: &format!("{name}@x.com"),
            password: "Abc12345!",
        })
        .unwrap();
        id
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn key_is_order_independent() {
        assert_eq!(participants_key("b", "a"), "a_b");
        assert_eq!(participants_key("a", "b"), "a_b");
    }

    #[test]
    fn same_pair_gets_same_conversation() {
        let db = Database::open_in_memory().unwrap();
        let ann = seed_user(&db, "ann");
        let bob = seed_user(&db, "bob");

        let first = db.get_or_create_conversation(&new_id(), &ann, &bob).unwrap();
        let second = db.get_or_create_conversation(&new_id(), &bob, &ann).unwrap();
        assert_eq!(first, second);

        let row = db.get_conversation(&first).unwrap().unwrap();
        assert!(row.has_participant(&ann) && row.has_participant(&bob));
        assert_eq!(row.peer_of(&ann), bob);
    }

    #[test]
    fn last_chats_and_seen_status() {
        let db = Database::open_in_memory().unwrap();
        let ann = seed_user(&db, "ann");
        let bob = seed_user(&db, "bob");
        let cara = seed_user(&db, "cara");

        let with_bob = db.get_or_create_conversation(&new_id(), &ann, &bob).unwrap();
        // No messages yet: not listed.
        db.get_or_create_conversation(&new_id(), &ann, &cara).unwrap();

        db.insert_chat(&new_id(), &with_bob, &bob, "hi").unwrap();
        db.insert_chat(&new_id(), &with_bob, &bob, "still there?").unwrap();
        db.insert_chat(&new_id(), &with_bob, &ann, "yes").unwrap();

        let chats = db.get_last_chats(&ann).unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].peer_id, bob);
        assert_eq!(chats[0].last_message, "yes");
        assert_eq!(chats[0].unread_count, 2);

        assert_eq!(db.mark_chats_viewed(&with_bob, &bob).unwrap(), 2);
        assert_eq!(db.get_last_chats(&ann).unwrap()[0].unread_count, 0);

        let history = db.get_chats(&with_bob).unwrap();
        let texts: Vec<&str> = history.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, ["hi", "still there?", "yes"]);
        assert!(!history[2].viewed);
    }
}
