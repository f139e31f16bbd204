mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "pulseboard")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("pulseboard.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // User operations
    // ============================================================

    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, email, name, role, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)",
            (
                id.to_string(),
                &input.email,
                &input.name,
                input.role.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(User {
            id,
            email: input.email,
            name: input.name,
            role: input.role,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, email, name, role, active, created_at, updated_at
             FROM users WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(user_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, email, name, role, active, created_at, updated_at
             FROM users ORDER BY email",
        )?;

        let users = stmt
            .query_map([], |row| user_from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    // ============================================================
    // Session operations
    // ============================================================

    /// Mint a bearer session for a user. Credential verification happens
    /// before this call, outside the service.
    pub fn create_session(
        &self,
        user_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Session> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let token = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
            (
                token.to_string(),
                user_id.to_string(),
                now.to_rfc3339(),
                expires_at.map(|d| d.to_rfc3339()),
            ),
        )?;

        Ok(Session {
            token,
            user_id,
            created_at: now,
            expires_at,
        })
    }

    /// Resolve a bearer token to its user. Expired and unknown tokens
    /// both resolve to `None`.
    pub fn resolve_session(&self, token: Uuid, now: DateTime<Utc>) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT u.id, u.email, u.name, u.role, u.active, u.created_at, u.updated_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token = ? AND (s.expires_at IS NULL OR s.expires_at > ?)",
        )?;

        let mut rows = stmt.query((token.to_string(), now.to_rfc3339()))?;
        match rows.next()? {
            Some(row) => Ok(Some(user_from_row(row)?)),
            None => Ok(None),
        }
    }

    // ============================================================
    // Objective operations
    // ============================================================

    pub fn create_objective(
        &self,
        input: CreateObjectiveInput,
        created_by: Uuid,
    ) -> Result<ObjectiveWithAssignments> {
        let id = Uuid::new_v4();

        {
            let mut conn = self.conn.lock().expect("database lock poisoned");
            let tx = conn.transaction()?;
            let now = Utc::now();
            let priority = input.priority.unwrap_or(Priority::Medium);

            tx.execute(
                "INSERT INTO objectives (id, title, description, priority, status, health_score, progress, target_date, created_by, created_at, updated_at)
                 VALUES (?, ?, ?, ?, 'NOT_STARTED', 100, 0, ?, ?, ?, ?)",
                (
                    id.to_string(),
                    input.title.trim(),
                    &input.description,
                    priority.as_str(),
                    input.target_date.map(|d| d.to_rfc3339()),
                    created_by.to_string(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;

            for user_id in &input.assigned_users {
                tx.execute(
                    "INSERT INTO assignments (id, objective_id, user_id, assigned_at)
                     VALUES (?, ?, ?, ?)",
                    (
                        Uuid::new_v4().to_string(),
                        id.to_string(),
                        user_id.to_string(),
                        now.to_rfc3339(),
                    ),
                )?;
            }

            tx.commit()?;
        }

        self.get_objective_with_assignments(id)?
            .ok_or_else(|| anyhow::anyhow!("Objective missing after create"))
    }

    pub fn get_objective(&self, id: Uuid) -> Result<Option<Objective>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBJECTIVE_COLUMNS} FROM objectives WHERE id = ?"
        ))?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(objective_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_objective_with_assignments(
        &self,
        id: Uuid,
    ) -> Result<Option<ObjectiveWithAssignments>> {
        let objective = match self.get_objective(id)? {
            Some(o) => o,
            None => return Ok(None),
        };

        let assignments = self.get_assignments(id)?;

        Ok(Some(ObjectiveWithAssignments {
            objective,
            assignments,
        }))
    }

    pub fn get_assignments(&self, objective_id: Uuid) -> Result<Vec<AssignmentWithUser>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT a.id, a.objective_id, a.user_id, a.assigned_at,
                    u.id, u.email, u.name, u.role, u.active, u.created_at, u.updated_at
             FROM assignments a JOIN users u ON u.id = a.user_id
             WHERE a.objective_id = ? ORDER BY a.assigned_at",
        )?;

        let assignments = stmt
            .query_map([objective_id.to_string()], |row| {
                Ok(AssignmentWithUser {
                    assignment: Assignment {
                        id: parse_uuid(row.get::<_, String>(0)?),
                        objective_id: parse_uuid(row.get::<_, String>(1)?),
                        user_id: parse_uuid(row.get::<_, String>(2)?),
                        assigned_at: parse_datetime(row.get::<_, String>(3)?),
                    },
                    user: User {
                        id: parse_uuid(row.get::<_, String>(4)?),
                        email: row.get(5)?,
                        name: row.get(6)?,
                        role: UserRole::from_str(&row.get::<_, String>(7)?)
                            .unwrap_or(UserRole::Member),
                        active: row.get::<_, i32>(8)? != 0,
                        created_at: parse_datetime(row.get::<_, String>(9)?),
                        updated_at: parse_datetime(row.get::<_, String>(10)?),
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assignments)
    }

    /// Filtered, paginated objective listing. Returns the page plus the
    /// total row count for the filter.
    pub fn list_objectives(
        &self,
        query: &ObjectiveQuery,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<ObjectiveWithAssignments>, i64)> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = query.status {
            clauses.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(priority) = query.priority {
            clauses.push("priority = ?");
            params.push(Box::new(priority.as_str().to_string()));
        }
        if let Some(search) = &query.search {
            clauses.push("title LIKE ?");
            params.push(Box::new(format!("%{}%", search)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let (rows, total) = {
            let conn = self.conn.lock().expect("database lock poisoned");
            let params_ref: Vec<&dyn rusqlite::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM objectives{}", where_sql),
                params_ref.as_slice(),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {OBJECTIVE_COLUMNS} FROM objectives{} ORDER BY updated_at DESC LIMIT ? OFFSET ?",
                where_sql
            ))?;

            let mut page_params = params_ref;
            let limit = page_size as i64;
            let offset = ((page - 1) * page_size) as i64;
            page_params.push(&limit);
            page_params.push(&offset);

            let objectives = stmt
                .query_map(page_params.as_slice(), |row| objective_from_row(row))?
                .collect::<Result<Vec<_>, _>>()?;

            (objectives, total)
        };

        let mut with_assignments = Vec::with_capacity(rows.len());
        for objective in rows {
            let assignments = self.get_assignments(objective.id)?;
            with_assignments.push(ObjectiveWithAssignments {
                objective,
                assignments,
            });
        }

        Ok((with_assignments, total))
    }

    /// Objectives where the given user is assigned, newest first.
    pub fn get_objectives_for_user(&self, user_id: Uuid) -> Result<Vec<ObjectiveWithAssignments>> {
        let rows = {
            let conn = self.conn.lock().expect("database lock poisoned");
            let mut stmt = conn.prepare(&format!(
                "SELECT {OBJECTIVE_COLUMNS} FROM objectives
                 WHERE id IN (SELECT objective_id FROM assignments WHERE user_id = ?)
                 ORDER BY updated_at DESC"
            ))?;

            let objectives = stmt
                .query_map([user_id.to_string()], |row| objective_from_row(row))?
                .collect::<Result<Vec<_>, _>>()?;
            objectives
        };

        let mut with_assignments = Vec::with_capacity(rows.len());
        for objective in rows {
            let assignments = self.get_assignments(objective.id)?;
            with_assignments.push(ObjectiveWithAssignments {
                objective,
                assignments,
            });
        }

        Ok(with_assignments)
    }

    pub fn get_all_objectives(&self) -> Result<Vec<Objective>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!("SELECT {OBJECTIVE_COLUMNS} FROM objectives"))?;

        let objectives = stmt
            .query_map([], |row| objective_from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(objectives)
    }

    pub fn get_assigned_objectives(&self, user_id: Uuid) -> Result<Vec<Objective>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBJECTIVE_COLUMNS} FROM objectives
             WHERE id IN (SELECT objective_id FROM assignments WHERE user_id = ?)"
        ))?;

        let objectives = stmt
            .query_map([user_id.to_string()], |row| objective_from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(objectives)
    }

    pub fn update_objective(
        &self,
        id: Uuid,
        input: UpdateObjectiveInput,
    ) -> Result<Option<Objective>> {
        let Some(existing) = self.get_objective(id)? else {
            return Ok(None);
        };

        let now = Utc::now();
        let title = input
            .title
            .map(|t| t.trim().to_string())
            .unwrap_or(existing.title);
        let description = input.description.or(existing.description);
        let priority = input.priority.unwrap_or(existing.priority);
        let status = input.status.unwrap_or(existing.status);
        let progress = input
            .progress
            .map(|p| p.clamp(0, 100))
            .unwrap_or(existing.progress);
        let target_date = input.target_date.or(existing.target_date);

        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE objectives SET title = ?, description = ?, priority = ?, status = ?, progress = ?, target_date = ?, updated_at = ? WHERE id = ?",
            (
                &title,
                &description,
                priority.as_str(),
                status.as_str(),
                progress,
                target_date.map(|d| d.to_rfc3339()),
                now.to_rfc3339(),
                id.to_string(),
            ),
        )?;

        if let Some(assigned_users) = &input.assigned_users {
            tx.execute(
                "DELETE FROM assignments WHERE objective_id = ?",
                [id.to_string()],
            )?;
            for user_id in assigned_users {
                tx.execute(
                    "INSERT INTO assignments (id, objective_id, user_id, assigned_at)
                     VALUES (?, ?, ?, ?)",
                    (
                        Uuid::new_v4().to_string(),
                        id.to_string(),
                        user_id.to_string(),
                        now.to_rfc3339(),
                    ),
                )?;
            }
        }

        tx.commit()?;

        Ok(Some(Objective {
            id,
            title,
            description,
            priority,
            status,
            health_score: existing.health_score,
            progress,
            target_date,
            created_by: existing.created_by,
            created_at: existing.created_at,
            updated_at: now,
        }))
    }

    pub fn delete_objective(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM objectives WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    pub fn is_assigned(&self, objective_id: Uuid, user_id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM assignments WHERE objective_id = ? AND user_id = ?",
            (objective_id.to_string(), user_id.to_string()),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Persist a recomputed health score, clamped to [0, 100].
    pub fn set_health_score(&self, objective_id: Uuid, score: i64) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE objectives SET health_score = ?, updated_at = ? WHERE id = ?",
            (
                score.clamp(0, 100),
                Utc::now().to_rfc3339(),
                objective_id.to_string(),
            ),
        )?;
        Ok(())
    }

    // ============================================================
    // Pulse operations
    // ============================================================

    pub fn create_pulse_request(
        &self,
        input: CreatePulseRequestInput,
        created_by: Uuid,
    ) -> Result<PulseRequest> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let question = input
            .question
            .unwrap_or_else(|| "How are you feeling about this objective?".to_string());

        conn.execute(
            "INSERT INTO pulse_requests (id, objective_id, question, created_by, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                input.objective_id.to_string(),
                &question,
                created_by.to_string(),
                now.to_rfc3339(),
                input.expires_at.map(|d| d.to_rfc3339()),
            ),
        )?;

        Ok(PulseRequest {
            id,
            objective_id: input.objective_id,
            question,
            created_by,
            created_at: now,
            expires_at: input.expires_at,
        })
    }

    pub fn get_pulse_request(&self, id: Uuid) -> Result<Option<PulseRequest>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, objective_id, question, created_by, created_at, expires_at
             FROM pulse_requests WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(pulse_request_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_all_pulse_requests(&self) -> Result<Vec<PulseRequest>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, objective_id, question, created_by, created_at, expires_at
             FROM pulse_requests ORDER BY created_at DESC",
        )?;

        let requests = stmt
            .query_map([], |row| pulse_request_from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    /// Pulse requests the user still has to answer: assigned to the
    /// objective, not expired, no response from them yet.
    pub fn get_pending_pulse_requests(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<PulseRequest>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT r.id, r.objective_id, r.question, r.created_by, r.created_at, r.expires_at
             FROM pulse_requests r
             JOIN assignments a ON a.objective_id = r.objective_id AND a.user_id = ?1
             WHERE (r.expires_at IS NULL OR r.expires_at > ?2)
               AND NOT EXISTS (
                   SELECT 1 FROM pulse_responses p
                   WHERE p.pulse_request_id = r.id AND p.user_id = ?1
               )
             ORDER BY r.created_at DESC",
        )?;

        let requests = stmt
            .query_map((user_id.to_string(), now.to_rfc3339()), |row| {
                pulse_request_from_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    /// Create or update the (request, user) response. The unique index
    /// on the pair backs this up under concurrent submissions. Returns
    /// the response and whether a new row was created.
    pub fn upsert_pulse_response(
        &self,
        input: &SubmitPulseResponseInput,
        user_id: Uuid,
    ) -> Result<(PulseResponse, bool)> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();

        let mut stmt = conn.prepare(
            "SELECT id, pulse_request_id, user_id, rating, feedback, created_at, updated_at
             FROM pulse_responses WHERE pulse_request_id = ? AND user_id = ?",
        )?;
        let mut rows = stmt.query((input.pulse_request_id.to_string(), user_id.to_string()))?;
        let existing = match rows.next()? {
            Some(row) => Some(pulse_response_from_row(row)?),
            None => None,
        };
        drop(rows);
        drop(stmt);

        if let Some(prev) = existing {
            conn.execute(
                "UPDATE pulse_responses SET rating = ?, feedback = ?, updated_at = ?
                 WHERE pulse_request_id = ? AND user_id = ?",
                (
                    input.rating,
                    &input.feedback,
                    now.to_rfc3339(),
                    input.pulse_request_id.to_string(),
                    user_id.to_string(),
                ),
            )?;

            Ok((
                PulseResponse {
                    rating: input.rating,
                    feedback: input.feedback.clone(),
                    updated_at: now,
                    ..prev
                },
                false,
            ))
        } else {
            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO pulse_responses (id, pulse_request_id, user_id, rating, feedback, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                (
                    id.to_string(),
                    input.pulse_request_id.to_string(),
                    user_id.to_string(),
                    input.rating,
                    &input.feedback,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;

            Ok((
                PulseResponse {
                    id,
                    pulse_request_id: input.pulse_request_id,
                    user_id,
                    rating: input.rating,
                    feedback: input.feedback.clone(),
                    created_at: now,
                    updated_at: now,
                },
                true,
            ))
        }
    }

    pub fn count_pulse_responses(&self, pulse_request_id: Uuid, user_id: Uuid) -> Result<i64> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pulse_responses WHERE pulse_request_id = ? AND user_id = ?",
            (pulse_request_id.to_string(), user_id.to_string()),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every sentiment rating for an objective, gathered through its
    /// pulse requests.
    pub fn get_objective_ratings(&self, objective_id: Uuid) -> Result<Vec<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT p.rating FROM pulse_responses p
             JOIN pulse_requests r ON r.id = p.pulse_request_id
             WHERE r.objective_id = ?",
        )?;

        let ratings = stmt
            .query_map([objective_id.to_string()], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ratings)
    }

    /// Count pulse requests whose expiry is unset or in the future,
    /// optionally scoped to objectives the given user is assigned to.
    pub fn count_active_pulse_requests(
        &self,
        assigned_user: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let count: i64 = match assigned_user {
            Some(user_id) => conn.query_row(
                "SELECT COUNT(*) FROM pulse_requests r
                 JOIN assignments a ON a.objective_id = r.objective_id AND a.user_id = ?
                 WHERE r.expires_at IS NULL OR r.expires_at > ?",
                (user_id.to_string(), now.to_rfc3339()),
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM pulse_requests
                 WHERE expires_at IS NULL OR expires_at > ?",
                [now.to_rfc3339()],
                |row| row.get(0),
            )?,
        };

        Ok(count)
    }

    // ============================================================
    // Blocker operations
    // ============================================================

    pub fn create_blocker(&self, input: CreateBlockerInput, reported_by: Uuid) -> Result<Blocker> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let severity = input.severity.unwrap_or(BlockerSeverity::Medium);

        conn.execute(
            "INSERT INTO blockers (id, objective_id, title, description, severity, status, reported_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'OPEN', ?, ?, ?)",
            (
                id.to_string(),
                input.objective_id.to_string(),
                input.title.trim(),
                &input.description,
                severity.as_str(),
                reported_by.to_string(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Blocker {
            id,
            objective_id: input.objective_id,
            title: input.title.trim().to_string(),
            description: input.description,
            severity,
            status: BlockerStatus::Open,
            reported_by,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        })
    }

    pub fn get_blocker(&self, id: Uuid) -> Result<Option<Blocker>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {BLOCKER_COLUMNS} FROM blockers WHERE id = ?"
        ))?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(blocker_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Filtered blocker listing, newest first. When `assigned_user` is
    /// set, only blockers on objectives that user is assigned to are
    /// returned.
    pub fn list_blockers(
        &self,
        query: &BlockerQuery,
        assigned_user: Option<Uuid>,
    ) -> Result<Vec<Blocker>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = query.status {
            clauses.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(objective_id) = query.objective_id {
            clauses.push("objective_id = ?");
            params.push(Box::new(objective_id.to_string()));
        }
        if let Some(user_id) = assigned_user {
            clauses.push(
                "EXISTS (SELECT 1 FROM assignments a
                 WHERE a.objective_id = blockers.objective_id AND a.user_id = ?)",
            );
            params.push(Box::new(user_id.to_string()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BLOCKER_COLUMNS} FROM blockers{} ORDER BY created_at DESC",
            where_sql
        ))?;

        let blockers = stmt
            .query_map(params_ref.as_slice(), |row| blocker_from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(blockers)
    }

    pub fn update_blocker(&self, id: Uuid, input: UpdateBlockerInput) -> Result<Option<Blocker>> {
        let Some(existing) = self.get_blocker(id)? else {
            return Ok(None);
        };

        let now = Utc::now();
        let status = input.status.unwrap_or(existing.status);
        let assigned_to = input.assigned_to.or(existing.assigned_to);
        let resolved_at = if status == BlockerStatus::Resolved {
            Some(now)
        } else {
            existing.resolved_at
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE blockers SET status = ?, assigned_to = ?, resolved_at = ?, updated_at = ? WHERE id = ?",
            (
                status.as_str(),
                assigned_to.map(|u| u.to_string()),
                resolved_at.map(|d| d.to_rfc3339()),
                now.to_rfc3339(),
                id.to_string(),
            ),
        )?;

        Ok(Some(Blocker {
            status,
            assigned_to,
            resolved_at,
            updated_at: now,
            ..existing
        }))
    }

    pub fn delete_blocker(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM blockers WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

const OBJECTIVE_COLUMNS: &str = "id, title, description, priority, status, health_score, progress, target_date, created_by, created_at, updated_at";

const BLOCKER_COLUMNS: &str = "id, objective_id, title, description, severity, status, reported_by, assigned_to, created_at, updated_at, resolved_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row.get::<_, String>(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        role: UserRole::from_str(&row.get::<_, String>(3)?).unwrap_or(UserRole::Member),
        active: row.get::<_, i32>(4)? != 0,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn objective_from_row(row: &Row<'_>) -> rusqlite::Result<Objective> {
    Ok(Objective {
        id: parse_uuid(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        priority: Priority::from_str(&row.get::<_, String>(3)?).unwrap_or(Priority::Medium),
        status: ObjectiveStatus::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(ObjectiveStatus::NotStarted),
        health_score: row.get(5)?,
        progress: row.get(6)?,
        target_date: row.get::<_, Option<String>>(7)?.map(parse_datetime),
        created_by: parse_uuid(row.get::<_, String>(8)?),
        created_at: parse_datetime(row.get::<_, String>(9)?),
        updated_at: parse_datetime(row.get::<_, String>(10)?),
    })
}

fn pulse_request_from_row(row: &Row<'_>) -> rusqlite::Result<PulseRequest> {
    Ok(PulseRequest {
        id: parse_uuid(row.get::<_, String>(0)?),
        objective_id: parse_uuid(row.get::<_, String>(1)?),
        question: row.get(2)?,
        created_by: parse_uuid(row.get::<_, String>(3)?),
        created_at: parse_datetime(row.get::<_, String>(4)?),
        expires_at: row.get::<_, Option<String>>(5)?.map(parse_datetime),
    })
}

fn pulse_response_from_row(row: &Row<'_>) -> rusqlite::Result<PulseResponse> {
    Ok(PulseResponse {
        id: parse_uuid(row.get::<_, String>(0)?),
        pulse_request_id: parse_uuid(row.get::<_, String>(1)?),
        user_id: parse_uuid(row.get::<_, String>(2)?),
        rating: row.get(3)?,
        feedback: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn blocker_from_row(row: &Row<'_>) -> rusqlite::Result<Blocker> {
    Ok(Blocker {
        id: parse_uuid(row.get::<_, String>(0)?),
        objective_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        severity: BlockerSeverity::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(BlockerSeverity::Medium),
        status: BlockerStatus::from_str(&row.get::<_, String>(5)?).unwrap_or(BlockerStatus::Open),
        reported_by: parse_uuid(row.get::<_, String>(6)?),
        assigned_to: row.get::<_, Option<String>>(7)?.map(parse_uuid),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
        resolved_at: row.get::<_, Option<String>>(10)?.map(parse_datetime),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
