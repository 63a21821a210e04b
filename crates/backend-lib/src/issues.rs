// ============================
// crates/backend-lib/src/issues.rs
// ============================
//! Issue submission, triage and statistics.
use std::collections::HashMap;
use std::sync::Arc;

use concern_common::{IssueStatus, IssueView, Role, Statistics, SubmitIssueRequest};
use metrics::counter;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::roles::{require_role, ADMINS, ISSUE_MODERATORS, STUDENT_ONLY, SUBADMIN_ONLY};
use crate::auth::Session;
use crate::clock::Clock;
use crate::error::AppError;
use crate::metrics::{ISSUE_STATUS_CHANGED, ISSUE_SUBMITTED};
use crate::models::{IssueFilter, IssueRecord, UserLookup};
use crate::notify::{deliver, templates, Notifier, Recipient};
use crate::storage::Store;
use crate::validation::{sanitize_string, validate_issue};

pub struct IssueService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    categories: Vec<String>,
}

impl IssueService {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            categories,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// File a new issue; students only
    #[instrument(skip(self, actor, request), fields(student = %actor.user_id))]
    pub async fn submit(
        &self,
        actor: &Session,
        request: SubmitIssueRequest,
    ) -> Result<IssueView, AppError> {
        require_role(actor, STUDENT_ONLY)?;
        let input = validate_issue(
            &request.subject,
            &request.category,
            &request.message,
            &self.categories,
        )?;
        let issue = IssueRecord {
            id: Uuid::new_v4().to_string(),
            student_id: actor.user_id.clone(),
            subject: input.subject,
            category: input.category,
            message: input.message,
            status: IssueStatus::Pending,
            response: String::new(),
            created_at: self.clock.now(),
            updated_at: None,
        };
        self.store.insert_issue(&issue).await?;
        counter!(ISSUE_SUBMITTED, "category" => issue.category.clone()).increment(1);
        info!(issue_id = %issue.id, "issue submitted");
        Ok(issue.to_view(Some(actor.username.clone())))
    }

    /// The caller's own issues, newest first
    pub async fn list_for_student(&self, actor: &Session) -> Result<Vec<IssueView>, AppError> {
        require_role(actor, STUDENT_ONLY)?;
        let filter = IssueFilter {
            student_id: Some(actor.user_id.clone()),
            ..IssueFilter::default()
        };
        Ok(self
            .store
            .list_issues(&filter)
            .await?
            .iter()
            .map(|i| i.to_view(Some(actor.username.clone())))
            .collect())
    }

    /// Every visible issue, optionally narrowed to one status
    pub async fn list_all(
        &self,
        actor: &Session,
        status: Option<IssueStatus>,
    ) -> Result<Vec<IssueView>, AppError> {
        require_role(actor, ADMINS)?;
        let filter = IssueFilter {
            status,
            include_deleted: status == Some(IssueStatus::Deleted),
            ..IssueFilter::default()
        };
        let issues = self.store.list_issues(&filter).await?;
        let usernames: HashMap<String, String> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();
        Ok(issues
            .iter()
            .map(|i| i.to_view(usernames.get(&i.student_id).cloned()))
            .collect())
    }

    /// Owner or staff. Students never see their deleted issues.
    pub async fn get(&self, actor: &Session, issue_id: &str) -> Result<IssueView, AppError> {
        let issue = self.load(issue_id).await?;
        match actor.role {
            Role::Student => {
                if issue.student_id != actor.user_id || issue.status == IssueStatus::Deleted {
                    return Err(AppError::NotFound("issue".to_string()));
                }
                Ok(issue.to_view(Some(actor.username.clone())))
            },
            Role::Subadmin | Role::Supaadmin => {
                let owner = self
                    .store
                    .find_user(UserLookup::Id(&issue.student_id))
                    .await?
                    .map(|u| u.username);
                Ok(issue.to_view(owner))
            },
        }
    }

    /// Move an issue through triage and tell the student; sub-admins only
    #[instrument(skip(self, actor, response), fields(actor = %actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &Session,
        issue_id: &str,
        status: IssueStatus,
        response: Option<String>,
    ) -> Result<IssueView, AppError> {
        require_role(actor, SUBADMIN_ONLY)?;
        if status == IssueStatus::Deleted {
            return Err(AppError::InvalidInput(
                "use delete to remove an issue".to_string(),
            ));
        }
        let issue = self.load(issue_id).await?;
        if issue.status == IssueStatus::Deleted {
            return Err(AppError::NotFound("issue".to_string()));
        }
        let response = response
            .map(|r| sanitize_string(&r))
            .filter(|r| !r.is_empty());
        self.store
            .update_issue_status(issue_id, status, response.as_deref(), self.clock.now())
            .await?;
        counter!(ISSUE_STATUS_CHANGED, "status" => status.as_str()).increment(1);
        info!(issue_id, status = status.as_str(), "issue status updated");

        let updated = self.load(issue_id).await?;
        let student = self
            .store
            .find_user(UserLookup::Id(&updated.student_id))
            .await?;
        if let Some(student) = &student {
            if status != issue.status && !student.email.is_empty() {
                let msg = templates::status_update_email(
                    &student.display_name(),
                    &updated.subject,
                    status,
                    &updated.response,
                );
                let to = Recipient::email(&student.email, student.display_name());
                deliver(self.notifier.as_ref(), &to, &msg.subject, &msg.body).await;
            }
        }
        Ok(updated.to_view(student.map(|s| s.username)))
    }

    /// Soft delete by the owning student or a sub-admin
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete(&self, actor: &Session, issue_id: &str) -> Result<(), AppError> {
        require_role(actor, ISSUE_MODERATORS)?;
        let issue = self.load(issue_id).await?;
        if issue.status == IssueStatus::Deleted {
            return Err(AppError::NotFound("issue".to_string()));
        }
        if actor.role == Role::Student && issue.student_id != actor.user_id {
            // Other students' issues are invisible, not forbidden
            return Err(AppError::NotFound("issue".to_string()));
        }
        self.store
            .update_issue_status(issue_id, IssueStatus::Deleted, None, self.clock.now())
            .await?;
        info!(issue_id, "issue deleted");
        Ok(())
    }

    /// Users by role and issues by status
    pub async fn statistics(&self, actor: &Session) -> Result<Statistics, AppError> {
        require_role(actor, ADMINS)?;
        let mut stats = Statistics::default();
        for role in Role::ALL {
            stats.users_by_role.insert(role, 0);
        }
        for user in self.store.list_users().await? {
            *stats.users_by_role.entry(user.role).or_default() += 1;
        }
        let all = IssueFilter {
            include_deleted: true,
            ..IssueFilter::default()
        };
        for issue in self.store.list_issues(&all).await? {
            *stats.issues_by_status.entry(issue.status).or_default() += 1;
        }
        Ok(stats)
    }

    async fn load(&self, issue_id: &str) -> Result<IssueRecord, AppError> {
        self.store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| AppError::NotFound("issue".to_string()))
    }
}
