use chrono::{Duration, Utc};
use pulseboard::db::Database;
use pulseboard::models::*;
use speculate2::speculate;
use uuid::Uuid;

#[test]
fn file_backed_database_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("data").join("pulseboard.db");

    {
        let db = Database::open(path.clone()).expect("Failed to open database");
        db.migrate().expect("Failed to run migrations");
        create_admin(&db);
    }

    let reopened = Database::open(path).expect("Failed to reopen database");
    reopened.migrate().expect("Failed to run migrations");
    let users = reopened.get_all_users().expect("Query failed");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, "admin@example.com");
}

fn create_admin(db: &Database) -> User {
    db.create_user(CreateUserInput {
        email: "admin@example.com".to_string(),
        name: Some("Admin".to_string()),
        role: UserRole::Admin,
    })
    .expect("Failed to create admin")
}

fn create_member(db: &Database, email: &str) -> User {
    db.create_user(CreateUserInput {
        email: email.to_string(),
        name: None,
        role: UserRole::Member,
    })
    .expect("Failed to create member")
}

fn create_objective(db: &Database, creator: &User, assigned: Vec<Uuid>) -> ObjectiveWithAssignments {
    db.create_objective(
        CreateObjectiveInput {
            title: "Test Objective".to_string(),
            description: None,
            priority: None,
            target_date: None,
            assigned_users: assigned,
        },
        creator.id,
    )
    .expect("Failed to create objective")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "users" {
        describe "create_user" {
            it "creates an active user" {
                let user = create_admin(&db);

                assert_eq!(user.email, "admin@example.com");
                assert_eq!(user.role, UserRole::Admin);
                assert!(user.active);
            }

            it "rejects duplicate emails" {
                create_admin(&db);

                let result = db.create_user(CreateUserInput {
                    email: "admin@example.com".to_string(),
                    name: None,
                    role: UserRole::Member,
                });

                assert!(result.is_err());
            }
        }

        describe "get_all_users" {
            it "returns users ordered by email" {
                create_member(&db, "zoe@example.com");
                create_member(&db, "amy@example.com");

                let users = db.get_all_users().expect("Query failed");
                assert_eq!(users.len(), 2);
                assert_eq!(users[0].email, "amy@example.com");
                assert_eq!(users[1].email, "zoe@example.com");
            }
        }
    }

    describe "sessions" {
        describe "resolve_session" {
            it "resolves a valid token to its user" {
                let user = create_admin(&db);
                let session = db.create_session(user.id, None).expect("Failed to create session");

                let resolved = db.resolve_session(session.token, Utc::now()).expect("Query failed");
                assert_eq!(resolved.expect("Session should resolve").id, user.id);
            }

            it "does not resolve unknown tokens" {
                let resolved = db.resolve_session(Uuid::new_v4(), Utc::now()).expect("Query failed");
                assert!(resolved.is_none());
            }

            it "does not resolve expired tokens" {
                let user = create_admin(&db);
                let expired = Utc::now() - Duration::hours(1);
                let session = db.create_session(user.id, Some(expired)).expect("Failed to create session");

                let resolved = db.resolve_session(session.token, Utc::now()).expect("Query failed");
                assert!(resolved.is_none());
            }
        }
    }

    describe "objectives" {
        describe "create_objective" {
            it "defaults health score to 100 and progress to 0" {
                let admin = create_admin(&db);
                let objective = create_objective(&db, &admin, vec![]);

                assert_eq!(objective.objective.health_score, 100);
                assert_eq!(objective.objective.progress, 0);
                assert_eq!(objective.objective.status, ObjectiveStatus::NotStarted);
                assert_eq!(objective.objective.priority, Priority::Medium);
            }

            it "creates assignments atomically with the objective" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");
                let objective = create_objective(&db, &admin, vec![member.id]);

                assert_eq!(objective.assignments.len(), 1);
                assert_eq!(objective.assignments[0].user.id, member.id);
                assert!(db.is_assigned(objective.objective.id, member.id).expect("Query failed"));
            }

            it "rejects duplicate assignees" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");

                let result = db.create_objective(
                    CreateObjectiveInput {
                        title: "Dup".to_string(),
                        description: None,
                        priority: None,
                        target_date: None,
                        assigned_users: vec![member.id, member.id],
                    },
                    admin.id,
                );

                assert!(result.is_err());
            }
        }

        describe "update_objective" {
            it "returns None for a missing objective" {
                let result = db.update_objective(Uuid::new_v4(), UpdateObjectiveInput {
                    title: None,
                    description: None,
                    priority: None,
                    status: None,
                    progress: None,
                    target_date: None,
                    assigned_users: None,
                }).expect("Query failed");

                assert!(result.is_none());
            }

            it "merges partial updates, keeping unset fields" {
                let admin = create_admin(&db);
                let objective = create_objective(&db, &admin, vec![]);

                let updated = db.update_objective(objective.objective.id, UpdateObjectiveInput {
                    title: None,
                    description: None,
                    priority: None,
                    status: Some(ObjectiveStatus::InProgress),
                    progress: Some(40),
                    target_date: None,
                    assigned_users: None,
                }).expect("Query failed").expect("Objective should exist");

                assert_eq!(updated.title, "Test Objective");
                assert_eq!(updated.status, ObjectiveStatus::InProgress);
                assert_eq!(updated.progress, 40);
            }

            it "clamps progress into [0, 100]" {
                let admin = create_admin(&db);
                let objective = create_objective(&db, &admin, vec![]);

                let updated = db.update_objective(objective.objective.id, UpdateObjectiveInput {
                    title: None,
                    description: None,
                    priority: None,
                    status: None,
                    progress: Some(250),
                    target_date: None,
                    assigned_users: None,
                }).expect("Query failed").expect("Objective should exist");

                assert_eq!(updated.progress, 100);
            }

            it "replaces the assignment set when provided" {
                let admin = create_admin(&db);
                let first = create_member(&db, "first@example.com");
                let second = create_member(&db, "second@example.com");
                let objective = create_objective(&db, &admin, vec![first.id]);

                db.update_objective(objective.objective.id, UpdateObjectiveInput {
                    title: None,
                    description: None,
                    priority: None,
                    status: None,
                    progress: None,
                    target_date: None,
                    assigned_users: Some(vec![second.id]),
                }).expect("Query failed");

                assert!(!db.is_assigned(objective.objective.id, first.id).expect("Query failed"));
                assert!(db.is_assigned(objective.objective.id, second.id).expect("Query failed"));
            }
        }

        describe "delete_objective" {
            it "cascades to assignments, pulse requests, and blockers" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");
                let objective = create_objective(&db, &admin, vec![member.id]);
                let objective_id = objective.objective.id;

                let request = db.create_pulse_request(CreatePulseRequestInput {
                    objective_id,
                    question: None,
                    expires_at: None,
                }, admin.id).expect("Failed to create pulse request");

                let blocker = db.create_blocker(CreateBlockerInput {
                    objective_id,
                    title: "Stuck".to_string(),
                    description: None,
                    severity: None,
                }, member.id).expect("Failed to create blocker");

                assert!(db.delete_objective(objective_id).expect("Delete failed"));

                assert!(!db.is_assigned(objective_id, member.id).expect("Query failed"));
                assert!(db.get_pulse_request(request.id).expect("Query failed").is_none());
                assert!(db.get_blocker(blocker.id).expect("Query failed").is_none());
            }

            it "returns false for a missing objective" {
                assert!(!db.delete_objective(Uuid::new_v4()).expect("Delete failed"));
            }
        }

        describe "list_objectives" {
            it "filters by status and paginates" {
                let admin = create_admin(&db);
                let first = create_objective(&db, &admin, vec![]);
                create_objective(&db, &admin, vec![]);

                db.update_objective(first.objective.id, UpdateObjectiveInput {
                    title: None,
                    description: None,
                    priority: None,
                    status: Some(ObjectiveStatus::Completed),
                    progress: None,
                    target_date: None,
                    assigned_users: None,
                }).expect("Update failed");

                let query = ObjectiveQuery {
                    status: Some(ObjectiveStatus::Completed),
                    ..Default::default()
                };
                let (objectives, total) = db.list_objectives(&query, 1, 20).expect("Query failed");
                assert_eq!(total, 1);
                assert_eq!(objectives.len(), 1);
                assert_eq!(objectives[0].objective.status, ObjectiveStatus::Completed);

                let (page, total) = db.list_objectives(&ObjectiveQuery::default(), 1, 1).expect("Query failed");
                assert_eq!(total, 2);
                assert_eq!(page.len(), 1);
            }

            it "matches titles case-insensitively" {
                let admin = create_admin(&db);
                db.create_objective(CreateObjectiveInput {
                    title: "Migrate Billing".to_string(),
                    description: None,
                    priority: None,
                    target_date: None,
                    assigned_users: vec![],
                }, admin.id).expect("Failed to create objective");

                let query = ObjectiveQuery {
                    search: Some("billing".to_string()),
                    ..Default::default()
                };
                let (objectives, total) = db.list_objectives(&query, 1, 20).expect("Query failed");
                assert_eq!(total, 1);
                assert_eq!(objectives[0].objective.title, "Migrate Billing");
            }
        }
    }

    describe "pulse_responses" {
        describe "upsert_pulse_response" {
            it "creates on first submission" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");
                let objective = create_objective(&db, &admin, vec![member.id]);
                let request = db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: None,
                }, admin.id).expect("Failed to create request");

                let (response, created) = db.upsert_pulse_response(&SubmitPulseResponseInput {
                    pulse_request_id: request.id,
                    rating: 3,
                    feedback: Some("ok".to_string()),
                }, member.id).expect("Upsert failed");

                assert!(created);
                assert_eq!(response.rating, 3);
                assert_eq!(db.count_pulse_responses(request.id, member.id).expect("Count failed"), 1);
            }

            it "updates in place on a second submission" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");
                let objective = create_objective(&db, &admin, vec![member.id]);
                let request = db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: None,
                }, admin.id).expect("Failed to create request");

                let (first, _) = db.upsert_pulse_response(&SubmitPulseResponseInput {
                    pulse_request_id: request.id,
                    rating: 3,
                    feedback: None,
                }, member.id).expect("Upsert failed");

                let (second, created) = db.upsert_pulse_response(&SubmitPulseResponseInput {
                    pulse_request_id: request.id,
                    rating: 5,
                    feedback: Some("better now".to_string()),
                }, member.id).expect("Upsert failed");

                assert!(!created);
                assert_eq!(second.id, first.id);
                assert_eq!(second.rating, 5);
                assert_eq!(db.count_pulse_responses(request.id, member.id).expect("Count failed"), 1);
            }
        }

        describe "get_objective_ratings" {
            it "gathers ratings across all of the objective's requests" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");
                let objective = create_objective(&db, &admin, vec![member.id]);

                for rating in [2, 4] {
                    let request = db.create_pulse_request(CreatePulseRequestInput {
                        objective_id: objective.objective.id,
                        question: None,
                        expires_at: None,
                    }, admin.id).expect("Failed to create request");

                    db.upsert_pulse_response(&SubmitPulseResponseInput {
                        pulse_request_id: request.id,
                        rating,
                        feedback: None,
                    }, member.id).expect("Upsert failed");
                }

                let mut ratings = db.get_objective_ratings(objective.objective.id).expect("Query failed");
                ratings.sort();
                assert_eq!(ratings, vec![2, 4]);
            }
        }

        describe "get_pending_pulse_requests" {
            it "excludes answered and expired requests" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");
                let objective = create_objective(&db, &admin, vec![member.id]);

                let open = db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: None,
                }, admin.id).expect("Failed to create request");

                let answered = db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: None,
                }, admin.id).expect("Failed to create request");
                db.upsert_pulse_response(&SubmitPulseResponseInput {
                    pulse_request_id: answered.id,
                    rating: 4,
                    feedback: None,
                }, member.id).expect("Upsert failed");

                db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: Some(Utc::now() - Duration::hours(1)),
                }, admin.id).expect("Failed to create request");

                let pending = db.get_pending_pulse_requests(member.id, Utc::now()).expect("Query failed");
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].id, open.id);
            }
        }

        describe "count_active_pulse_requests" {
            it "counts unset and future expiries only" {
                let admin = create_admin(&db);
                let objective = create_objective(&db, &admin, vec![]);

                db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: None,
                }, admin.id).expect("Failed to create request");

                db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: Some(Utc::now() + Duration::hours(1)),
                }, admin.id).expect("Failed to create request");

                db.create_pulse_request(CreatePulseRequestInput {
                    objective_id: objective.objective.id,
                    question: None,
                    expires_at: Some(Utc::now() - Duration::hours(1)),
                }, admin.id).expect("Failed to create request");

                let count = db.count_active_pulse_requests(None, Utc::now()).expect("Count failed");
                assert_eq!(count, 2);
            }

            it "scopes to the user's assignments when given" {
                let admin = create_admin(&db);
                let member = create_member(&db, "member@example.com");
                let mine = create_objective(&db, &admin, vec![member.id]);
                let other = create_objective(&db, &admin, vec![]);

                for objective_id in [mine.objective.id, other.objective.id] {
                    db.create_pulse_request(CreatePulseRequestInput {
                        objective_id,
                        question: None,
                        expires_at: None,
                    }, admin.id).expect("Failed to create request");
                }

                let count = db.count_active_pulse_requests(Some(member.id), Utc::now()).expect("Count failed");
                assert_eq!(count, 1);
            }
        }
    }

    describe "blockers" {
        it "creates with default severity and open status" {
            let admin = create_admin(&db);
            let member = create_member(&db, "member@example.com");
            let objective = create_objective(&db, &admin, vec![member.id]);

            let blocker = db.create_blocker(CreateBlockerInput {
                objective_id: objective.objective.id,
                title: "Blocked on review".to_string(),
                description: None,
                severity: None,
            }, member.id).expect("Failed to create blocker");

            assert_eq!(blocker.severity, BlockerSeverity::Medium);
            assert_eq!(blocker.status, BlockerStatus::Open);
            assert_eq!(blocker.reported_by, member.id);
            assert!(blocker.resolved_at.is_none());
        }

        it "scopes the listing to the user's assignments" {
            let admin = create_admin(&db);
            let member = create_member(&db, "member@example.com");
            let outsider = create_member(&db, "outsider@example.com");
            let objective = create_objective(&db, &admin, vec![member.id]);

            db.create_blocker(CreateBlockerInput {
                objective_id: objective.objective.id,
                title: "Visible to assignees".to_string(),
                description: None,
                severity: None,
            }, member.id).expect("Failed to create blocker");

            let for_member = db.list_blockers(&BlockerQuery::default(), Some(member.id)).expect("Query failed");
            assert_eq!(for_member.len(), 1);

            let for_outsider = db.list_blockers(&BlockerQuery::default(), Some(outsider.id)).expect("Query failed");
            assert!(for_outsider.is_empty());

            let for_admin = db.list_blockers(&BlockerQuery::default(), None).expect("Query failed");
            assert_eq!(for_admin.len(), 1);
        }

        it "stamps resolved_at when a blocker is resolved" {
            let admin = create_admin(&db);
            let member = create_member(&db, "member@example.com");
            let objective = create_objective(&db, &admin, vec![member.id]);

            let blocker = db.create_blocker(CreateBlockerInput {
                objective_id: objective.objective.id,
                title: "Stuck".to_string(),
                description: None,
                severity: Some(BlockerSeverity::High),
            }, member.id).expect("Failed to create blocker");

            let updated = db.update_blocker(blocker.id, UpdateBlockerInput {
                status: Some(BlockerStatus::Resolved),
                assigned_to: Some(admin.id),
            }).expect("Update failed").expect("Blocker should exist");

            assert_eq!(updated.status, BlockerStatus::Resolved);
            assert_eq!(updated.assigned_to, Some(admin.id));
            assert!(updated.resolved_at.is_some());
        }

        it "returns None when updating a missing blocker" {
            let result = db.update_blocker(Uuid::new_v4(), UpdateBlockerInput {
                status: None,
                assigned_to: None,
            }).expect("Update failed");

            assert!(result.is_none());
        }
    }
}
