use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

pub type MemberId = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub members: Vec<Member>,
    pub created_by: MemberId,
    pub color: String,
}

impl Group {
    pub fn has_member(&self, id: &str) -> bool {
        self.members.iter().any(|member| member.id == id)
    }

    fn require_member(&self, id: &str) -> ApiResult<()> {
        if self.has_member(id) {
            Ok(())
        } else {
            Err(ApiError::validation(format!(
                "{id} is not a member of group {}",
                self.id
            )))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub group_id: String,
    pub paid_by: MemberId,
    pub split_between: Vec<MemberId>,
    pub date: DateTime<Utc>,
    pub created_by: MemberId,
    pub settled: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settlement {
    pub id: String,
    pub group_id: String,
    pub from_member: MemberId,
    pub to_member: MemberId,
    pub amount: f64,
    pub description: String,
    pub date: DateTime<Utc>,
    pub confirmed: bool,
}

impl Settlement {
    /// Marks the settlement as received. Only `to_member` may do it, and only
    /// once.
    pub fn confirm(&mut self, member: &str) -> ApiResult<()> {
        if self.to_member != member {
            return Err(ApiError::Forbidden(
                "only the receiving member can confirm a settlement".to_string(),
            ));
        }
        if self.confirmed {
            return Err(ApiError::Conflict(format!(
                "settlement {} is already confirmed",
                self.id
            )));
        }
        self.confirmed = true;
        Ok(())
    }
}

/// Everything the ledger needs to know about one group, already loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupLedger {
    pub group: Group,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
}

fn default_color() -> String {
    "#4f46e5".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn require_positive(amount: f64) -> ApiResult<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(ApiError::validation("amount must be a positive number"))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewGroup {
    pub name: String,
    pub members: Vec<Member>,
    pub created_by: MemberId,
    #[serde(default = "default_color")]
    pub color: String,
}

impl NewGroup {
    pub fn into_group(self, id: String) -> ApiResult<Group> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("group name must not be empty"));
        }
        if self.members.is_empty() {
            return Err(ApiError::validation("a group needs at least one member"));
        }
        let mut seen = HashSet::new();
        if let Some(member) = self.members.iter().find(|m| !seen.insert(m.id.as_str())) {
            return Err(ApiError::validation(format!(
                "member {} is listed twice",
                member.id
            )));
        }
        let group = Group {
            id,
            name: self.name,
            members: self.members,
            created_by: self.created_by,
            color: self.color,
        };
        group.require_member(&group.created_by)?;
        Ok(group)
    }
}

/// Body of both expense creation and edition.
///
/// On edition, a missing `date` or `settled` keeps the stored value.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: f64,
    #[serde(default = "default_category")]
    pub category: String,
    pub paid_by: MemberId,
    pub split_between: Vec<MemberId>,
    pub date: Option<DateTime<Utc>>,
    pub created_by: MemberId,
    #[serde(default)]
    pub settled: Option<bool>,
}

impl NewExpense {
    fn validate(&self, group: &Group) -> ApiResult<()> {
        require_positive(self.amount)?;
        if self.split_between.is_empty() {
            return Err(ApiError::validation(
                "an expense must be split between at least one member",
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.split_between.iter().find(|m| !seen.insert(m.as_str())) {
            return Err(ApiError::validation(format!(
                "{dup} appears twice in the split"
            )));
        }
        group.require_member(&self.paid_by)?;
        group.require_member(&self.created_by)?;
        for member in &self.split_between {
            group.require_member(member)?;
        }
        Ok(())
    }

    pub fn into_expense(self, id: String, group: &Group) -> ApiResult<Expense> {
        self.validate(group)?;
        Ok(Expense {
            id,
            description: self.description,
            amount: self.amount,
            category: self.category,
            group_id: group.id.clone(),
            paid_by: self.paid_by,
            split_between: self.split_between,
            date: self.date.unwrap_or_else(Utc::now),
            created_by: self.created_by,
            settled: self.settled.unwrap_or(false),
        })
    }

    /// Applies the edit to `existing`. Id, group and author never change.
    pub fn apply_to(self, existing: Expense, group: &Group) -> ApiResult<Expense> {
        self.validate(group)?;
        Ok(Expense {
            description: self.description,
            amount: self.amount,
            category: self.category,
            paid_by: self.paid_by,
            split_between: self.split_between,
            date: self.date.unwrap_or(existing.date),
            settled: self.settled.unwrap_or(existing.settled),
            ..existing
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewSettlement {
    pub from_member: MemberId,
    pub to_member: MemberId,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    pub date: Option<DateTime<Utc>>,
}

impl NewSettlement {
    pub fn into_settlement(self, id: String, group: &Group) -> ApiResult<Settlement> {
        require_positive(self.amount)?;
        if self.from_member == self.to_member {
            return Err(ApiError::validation("a member cannot settle with themselves"));
        }
        group.require_member(&self.from_member)?;
        group.require_member(&self.to_member)?;
        Ok(Settlement {
            id,
            group_id: group.id.clone(),
            from_member: self.from_member,
            to_member: self.to_member,
            amount: self.amount,
            description: self.description,
            date: self.date.unwrap_or_else(Utc::now),
            confirmed: false,
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConfirmSettlement {
    pub member: MemberId,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SplitRequest {
    pub amount: f64,
    pub participants: Vec<MemberId>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SplitResponse {
    pub share: f64,
    pub display: f64,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn member(id: &str) -> Member {
        Member {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: format!("{id}@example.com"),
        }
    }

    pub(crate) fn group(id: &str, members: &[&str]) -> Group {
        Group {
            id: id.to_string(),
            name: format!("group {id}"),
            members: members.iter().map(|m| member(m)).collect(),
            created_by: members[0].to_string(),
            color: default_color(),
        }
    }

    fn new_expense(amount: f64, paid_by: &str, split: &[&str]) -> NewExpense {
        NewExpense {
            description: "dinner".to_string(),
            amount,
            category: default_category(),
            paid_by: paid_by.to_string(),
            split_between: split.iter().map(|m| m.to_string()).collect(),
            date: None,
            created_by: paid_by.to_string(),
            settled: None,
        }
    }

    #[test]
    fn valid_expense_is_bound_to_the_group() {
        let g = group("g", &["a", "b"]);
        let expense = new_expense(100.0, "a", &["a", "b"])
            .into_expense("e1".to_string(), &g)
            .unwrap();
        assert_eq!(expense.group_id, "g");
        assert!(!expense.settled);
    }

    #[test]
    fn expense_amount_must_be_positive() {
        let g = group("g", &["a", "b"]);
        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = new_expense(amount, "a", &["a"])
                .into_expense("e".to_string(), &g)
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
    }

    #[test]
    fn expense_split_must_be_non_empty_and_unique() {
        let g = group("g", &["a", "b"]);
        assert!(new_expense(10.0, "a", &[])
            .into_expense("e".to_string(), &g)
            .is_err());
        assert!(new_expense(10.0, "a", &["b", "b"])
            .into_expense("e".to_string(), &g)
            .is_err());
    }

    #[test]
    fn expense_members_must_belong_to_the_group() {
        let g = group("g", &["a", "b"]);
        assert!(new_expense(10.0, "z", &["a"])
            .into_expense("e".to_string(), &g)
            .is_err());
        assert!(new_expense(10.0, "a", &["a", "z"])
            .into_expense("e".to_string(), &g)
            .is_err());
    }

    #[test]
    fn expense_author_must_belong_to_the_group() {
        let g = group("g", &["a", "b"]);
        let mut body = new_expense(10.0, "a", &["a", "b"]);
        body.created_by = "z".to_string();
        let err = body.into_expense("e".to_string(), &g).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn edit_keeps_date_and_settled_when_omitted() {
        let g = group("g", &["a", "b"]);
        let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut existing = new_expense(100.0, "a", &["a", "b"])
            .into_expense("e1".to_string(), &g)
            .unwrap();
        existing.date = date;
        existing.settled = true;

        let edited = new_expense(80.0, "b", &["a", "b"])
            .apply_to(existing.clone(), &g)
            .unwrap();
        assert_eq!(edited.amount, 80.0);
        assert_eq!(edited.paid_by, "b");
        assert_eq!(edited.date, date);
        assert!(edited.settled);
        assert_eq!(edited.id, existing.id);
        assert_eq!(edited.created_by, existing.created_by);
    }

    #[test]
    fn edit_overrides_date_and_settled_when_given() {
        let g = group("g", &["a", "b"]);
        let mut existing = new_expense(100.0, "a", &["a", "b"])
            .into_expense("e1".to_string(), &g)
            .unwrap();
        existing.settled = true;
        let date = Utc.with_ymd_and_hms(2021, 6, 15, 12, 0, 0).unwrap();

        let mut body = new_expense(100.0, "a", &["a", "b"]);
        body.date = Some(date);
        body.settled = Some(false);
        let edited = body.apply_to(existing, &g).unwrap();
        assert_eq!(edited.date, date);
        assert!(!edited.settled);
    }

    #[test]
    fn edit_body_without_settled_deserializes() {
        let body: NewExpense = serde_json::from_str(
            r#"{"description":"taxi","amount":12.5,"paid_by":"a","split_between":["a"],"created_by":"a"}"#,
        )
        .unwrap();
        assert_eq!(body.settled, None);
        assert_eq!(body.date, None);
    }

    fn pending_settlement(g: &Group) -> Settlement {
        NewSettlement {
            from_member: "b".to_string(),
            to_member: "a".to_string(),
            amount: 20.0,
            description: String::new(),
            date: None,
        }
        .into_settlement("s1".to_string(), g)
        .unwrap()
    }

    #[test]
    fn receiver_confirms_a_settlement() {
        let g = group("g", &["a", "b"]);
        let mut settlement = pending_settlement(&g);
        settlement.confirm("a").unwrap();
        assert!(settlement.confirmed);
    }

    #[test]
    fn only_the_receiver_can_confirm() {
        let g = group("g", &["a", "b"]);
        let mut settlement = pending_settlement(&g);
        let err = settlement.confirm("b").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(!settlement.confirmed);
    }

    #[test]
    fn confirmation_happens_once() {
        let g = group("g", &["a", "b"]);
        let mut settlement = pending_settlement(&g);
        settlement.confirm("a").unwrap();
        let err = settlement.confirm("a").unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert!(settlement.confirmed);
    }

    #[test]
    fn settlement_rejects_self_payment_and_strangers() {
        let g = group("g", &["a", "b"]);
        let settlement = |from: &str, to: &str| NewSettlement {
            from_member: from.to_string(),
            to_member: to.to_string(),
            amount: 20.0,
            description: String::new(),
            date: None,
        };
        assert!(settlement("a", "a").into_settlement("s".into(), &g).is_err());
        assert!(settlement("a", "z").into_settlement("s".into(), &g).is_err());
        let ok = settlement("b", "a").into_settlement("s".into(), &g).unwrap();
        assert!(!ok.confirmed);
    }

    #[test]
    fn group_rejects_duplicate_members_and_outside_creator() {
        let dup = NewGroup {
            name: "trip".to_string(),
            members: vec![member("a"), member("a")],
            created_by: "a".to_string(),
            color: default_color(),
        };
        assert!(dup.into_group("g".to_string()).is_err());

        let outsider = NewGroup {
            name: "trip".to_string(),
            members: vec![member("a")],
            created_by: "z".to_string(),
            color: default_color(),
        };
        assert!(outsider.into_group("g".to_string()).is_err());
    }

    #[test]
    fn group_body_defaults_color() {
        let body: NewGroup = serde_json::from_str(
            r#"{"name":"flat","members":[{"id":"a","name":"A","email":"a@x"}],"created_by":"a"}"#,
        )
        .unwrap();
        assert_eq!(body.color, default_color());
    }
}
