//! `__authorize`: checks the authenticated actor against the access rule
//! registered for the dispatched `(module, function)`.

use async_trait::async_trait;
use axion_core::AppError;
use axion_core::permissions::{
    ACTION_CONFIG, ACTION_CREATE, ACTION_READ, RESOURCE_CLASSROOM, RESOURCE_SCHOOL,
    RESOURCE_STUDENT, RESOURCE_USER,
};
use serde_json::json;
use tracing::{debug, warn};

use super::AUTH;
use super::auth::AuthContext;
use crate::authorization::AuthorizationEngine;
use crate::modules::auth::AuthService;
use crate::pipeline::{Middleware, Rejection, RequestContext, StepOutcome, StepResults};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    /// Permission key checked against the actor's role.
    Scoped {
        resource: &'static str,
        action: &'static str,
    },
    /// Same, and the actor must also be a superadmin.
    Global {
        resource: &'static str,
        action: &'static str,
    },
    Skip,
}

use AccessRule::{Global, Scoped, Skip};

const fn scoped(resource: &'static str, action: &'static str) -> AccessRule {
    Scoped { resource, action }
}

const fn global(resource: &'static str, action: &'static str) -> AccessRule {
    Global { resource, action }
}

const RULES: &[(&str, &str, AccessRule)] = &[
    ("schools", "v1_createSchool", global(RESOURCE_SCHOOL, ACTION_CONFIG)),
    ("schools", "v1_getSchool", global(RESOURCE_SCHOOL, ACTION_READ)),
    ("schools", "v1_listSchools", global(RESOURCE_SCHOOL, ACTION_READ)),
    ("schools", "v1_updateSchool", global(RESOURCE_SCHOOL, ACTION_CONFIG)),
    ("schools", "v1_deleteSchool", global(RESOURCE_SCHOOL, ACTION_CONFIG)),
    ("classrooms", "v1_createClassroom", scoped(RESOURCE_CLASSROOM, ACTION_CREATE)),
    ("classrooms", "v1_getClassroom", scoped(RESOURCE_CLASSROOM, ACTION_READ)),
    ("classrooms", "v1_listClassrooms", scoped(RESOURCE_CLASSROOM, ACTION_READ)),
    ("classrooms", "v1_updateClassroom", scoped(RESOURCE_CLASSROOM, ACTION_CONFIG)),
    ("classrooms", "v1_deleteClassroom", scoped(RESOURCE_CLASSROOM, ACTION_CONFIG)),
    ("students", "v1_enrollStudent", scoped(RESOURCE_STUDENT, ACTION_CREATE)),
    ("students", "v1_getStudent", scoped(RESOURCE_STUDENT, ACTION_READ)),
    ("students", "v1_listStudents", scoped(RESOURCE_STUDENT, ACTION_READ)),
    ("students", "v1_updateStudent", scoped(RESOURCE_STUDENT, ACTION_CONFIG)),
    ("students", "v1_transferStudent", scoped(RESOURCE_STUDENT, ACTION_CONFIG)),
    ("students", "v1_deleteStudent", scoped(RESOURCE_STUDENT, ACTION_CONFIG)),
    ("auth", "v1_createSchoolAdmin", global(RESOURCE_USER, ACTION_CREATE)),
    ("auth", "v1_listUsers", scoped(RESOURCE_USER, ACTION_READ)),
    ("auth", "v1_updateUser", global(RESOURCE_USER, ACTION_CONFIG)),
    ("auth", "v1_deleteUser", global(RESOURCE_USER, ACTION_CONFIG)),
    ("auth", "v1_revokeUserTokens", global(RESOURCE_USER, ACTION_CONFIG)),
    ("auth", "v1_me", Skip),
    ("authorization", "v1_listRolePermissions", global(RESOURCE_USER, ACTION_READ)),
    ("authorization", "v1_setRolePermissions", global(RESOURCE_USER, ACTION_CONFIG)),
];

pub fn access_rule(module: &str, function: &str) -> Option<AccessRule> {
    RULES
        .iter()
        .find(|(m, f, _)| *m == module && *f == function)
        .map(|&(_, _, rule)| rule)
}

pub struct Authorize {
    auth: AuthService,
    engine: AuthorizationEngine,
}

impl Authorize {
    pub fn new(auth: AuthService, engine: AuthorizationEngine) -> Self {
        Self { auth, engine }
    }
}

#[async_trait]
impl Middleware for Authorize {
    async fn handle(
        &self,
        ctx: &RequestContext,
        results: &StepResults,
    ) -> Result<StepOutcome, AppError> {
        let (resource, action, is_global) = match access_rule(&ctx.module, &ctx.function) {
            None | Some(Skip) => {
                return Ok(StepOutcome::Next(json!({ "authorized": true, "skipped": true })));
            }
            Some(Scoped { resource, action }) => (resource, action, false),
            Some(Global { resource, action }) => (resource, action, true),
        };

        let auth: Option<AuthContext> = results
            .get(AUTH)
            .and_then(|value| serde_json::from_value(value.clone()).ok());
        if auth.as_ref().and_then(|a| a.claims.user_id.as_ref()).is_none() {
            return Ok(StepOutcome::Reject(Rejection::unauthorized()));
        }

        let actor = match self.auth.ensure_authenticated_actor(auth.as_ref()).await {
            Ok(Some(user)) => user.actor(),
            Ok(None) => return Ok(StepOutcome::Reject(Rejection::unauthorized())),
            Err(failure) => {
                warn!(error = ?failure.error, "Actor lookup failed");
                return Ok(StepOutcome::Reject(Rejection::internal()));
            }
        };

        let authorized = if is_global {
            self.engine
                .has_global_permission(&actor, resource, action)
                .await?
        } else {
            self.engine.has_permission(&actor, resource, action).await?
        };

        if !authorized {
            debug!(user.id = %actor.id, resource, action, "Access denied");
            return Ok(StepOutcome::Reject(Rejection::forbidden()));
        }

        Ok(StepOutcome::Next(json!({
            "authorized": true,
            "actor": {
                "_id": actor.id,
                "role": actor.role,
                "schoolId": actor.school_id,
            },
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_lookup() {
        assert_eq!(
            access_rule("auth", "v1_createSchoolAdmin"),
            Some(Global {
                resource: "user",
                action: "create"
            })
        );
        assert_eq!(
            access_rule("classrooms", "v1_getClassroom"),
            Some(Scoped {
                resource: "classroom",
                action: "read"
            })
        );
        assert_eq!(access_rule("auth", "v1_me"), Some(Skip));
        assert_eq!(access_rule("auth", "v1_login"), None);
    }

    #[test]
    fn test_rule_table_has_no_duplicates() {
        for (i, (module, function, _)) in RULES.iter().enumerate() {
            assert!(
                !RULES[i + 1..]
                    .iter()
                    .any(|(m, f, _)| m == module && f == function),
                "duplicate rule for {}.{}",
                module,
                function
            );
        }
    }
}
