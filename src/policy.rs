use uuid::Uuid;

use crate::models::User;

/// The actor behind a request. Write routes sit behind the auth middleware,
/// so handlers there always hold a `Known` principal; `Anonymous` covers the
/// public read paths.
#[derive(Debug, Clone, Copy)]
pub enum Principal<'a> {
    Anonymous,
    Known(&'a User),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceKind {
    Category,
    Genre,
    Title,
    Review,
    Comment,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Single authorization decision point.
///
/// `owner` is the author of the specific instance when the operation targets
/// one (review/comment update/delete), `None` for list/create. The decision
/// is instance-sensitive, not just role-sensitive, and must be evaluated
/// against the freshly fetched instance on every request.
///
/// The `/users/me` profile path does not go through this function; any
/// authenticated principal may read and update their own profile there
/// (with `role` excluded from self-edit at the DTO level).
pub fn authorize(
    principal: Principal<'_>,
    kind: ResourceKind,
    owner: Option<Uuid>,
    action: Action,
) -> bool {
    let user = match principal {
        // Anonymous principals read the public catalog and content, nothing else.
        Principal::Anonymous => {
            return action == Action::Read && kind != ResourceKind::User;
        }
        Principal::Known(user) => user,
    };

    if user.is_admin() {
        return true;
    }

    match kind {
        // User administration is admin-only in its entirety.
        ResourceKind::User => false,

        // Catalog entities are globally shared: anyone reads, only admins write.
        ResourceKind::Category | ResourceKind::Genre | ResourceKind::Title => {
            action == Action::Read
        }

        ResourceKind::Review | ResourceKind::Comment => match action {
            Action::Read | Action::Create => true,
            Action::Update | Action::Delete => {
                user.is_moderator() || owner == Some(user.id)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn user_with(role: UserRole, is_superuser: bool) -> User {
        User {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            email: "tester@example.com".to_string(),
            role,
            first_name: None,
            last_name: None,
            bio: None,
            is_superuser,
            confirmation_code: None,
            code_expires_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    const CONTENT: [ResourceKind; 2] = [ResourceKind::Review, ResourceKind::Comment];
    const CATALOG: [ResourceKind; 3] = [
        ResourceKind::Category,
        ResourceKind::Genre,
        ResourceKind::Title,
    ];

    #[test]
    fn anonymous_is_read_only() {
        for kind in CATALOG.into_iter().chain(CONTENT) {
            assert!(authorize(Principal::Anonymous, kind, None, Action::Read));
            for action in [Action::Create, Action::Update, Action::Delete] {
                assert!(!authorize(Principal::Anonymous, kind, None, action));
            }
        }
        assert!(!authorize(
            Principal::Anonymous,
            ResourceKind::User,
            None,
            Action::Read
        ));
    }

    #[test]
    fn plain_user_creates_content_but_not_catalog() {
        let user = user_with(UserRole::User, false);
        let p = Principal::Known(&user);

        for kind in CONTENT {
            assert!(authorize(p, kind, None, Action::Create));
        }
        for kind in CATALOG {
            assert!(authorize(p, kind, None, Action::Read));
            assert!(!authorize(p, kind, None, Action::Create));
            assert!(!authorize(p, kind, None, Action::Delete));
        }
        assert!(!authorize(p, ResourceKind::User, None, Action::Read));
    }

    #[test]
    fn owner_mutates_own_content_only() {
        let user = user_with(UserRole::User, false);
        let p = Principal::Known(&user);
        let stranger = Uuid::new_v4();

        for kind in CONTENT {
            assert!(authorize(p, kind, Some(user.id), Action::Update));
            assert!(authorize(p, kind, Some(user.id), Action::Delete));
            assert!(!authorize(p, kind, Some(stranger), Action::Update));
            assert!(!authorize(p, kind, Some(stranger), Action::Delete));
        }
    }

    #[test]
    fn moderator_mutates_any_content_but_not_catalog() {
        let moderator = user_with(UserRole::Moderator, false);
        let p = Principal::Known(&moderator);
        let stranger = Uuid::new_v4();

        for kind in CONTENT {
            assert!(authorize(p, kind, Some(stranger), Action::Update));
            assert!(authorize(p, kind, Some(stranger), Action::Delete));
        }
        assert!(!authorize(p, ResourceKind::Title, None, Action::Create));
        assert!(!authorize(p, ResourceKind::User, None, Action::Read));
    }

    #[test]
    fn admin_and_superuser_are_unrestricted() {
        let admin = user_with(UserRole::Admin, false);
        let superuser = user_with(UserRole::User, true);
        let stranger = Uuid::new_v4();

        for user in [&admin, &superuser] {
            let p = Principal::Known(user);
            for kind in CATALOG.into_iter().chain(CONTENT) {
                for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
                    assert!(authorize(p, kind, Some(stranger), action));
                }
            }
            assert!(authorize(p, ResourceKind::User, None, Action::Delete));
        }
    }
}
