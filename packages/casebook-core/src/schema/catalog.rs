//! Built-in schemas for case-management records.

use super::FieldKind::{Bool, List, Number, Text, Timestamp};
use super::{FieldDef, RecordSchema};

fn schema(name: &str, collection: &str, fields: Vec<FieldDef>) -> RecordSchema {
    RecordSchema {
        name: name.to_string(),
        collection: collection.to_string(),
        fields,
    }
}

fn flags(name: &str, names: &[&str]) -> FieldDef {
    FieldDef::object(
        name,
        names.iter().map(|n| FieldDef::new(*n, Bool)).collect(),
    )
}

/// Client profile, contact details, intake checklists, and assignment metadata.
pub fn client() -> RecordSchema {
    schema(
        "client",
        "clients",
        vec![
            FieldDef::new("googleDriveLink", Text).optional(),
            FieldDef::object(
                "profile",
                vec![
                    FieldDef::new("firstName", Text),
                    FieldDef::new("lastName", Text),
                    FieldDef::new("dob", Text),
                    FieldDef::new("age", Number),
                ],
            ),
            FieldDef::object(
                "contactInfo",
                vec![
                    FieldDef::new("phone", Text),
                    FieldDef::new("phone2", Text).optional(),
                    FieldDef::new("email", Text),
                    FieldDef::new("street", Text),
                    FieldDef::new("apt", Text).optional(),
                    FieldDef::new("city", Text),
                    FieldDef::new("state", Text),
                    FieldDef::new("zip", Text),
                ],
            ),
            FieldDef::new("referralSource", Text),
            flags(
                "caseManagement",
                &[
                    "applicationPacket",
                    "id",
                    "proofOfIncome",
                    "initialAssessment",
                    "roi",
                    "ispCompleted",
                ],
            ),
            FieldDef::object(
                "training",
                vec![
                    FieldDef::new("cpr", Bool),
                    FieldDef::new("firstAid", Bool),
                    FieldDef::new("foodHandlersCard", Bool),
                    FieldDef::new("osha10", Bool),
                    FieldDef::new("nccer", Bool),
                    FieldDef::new("otherCertificates", Text).optional(),
                    FieldDef::new("constructionCTE", Bool),
                    FieldDef::new("cosmetologyCTE", Bool),
                    FieldDef::new("culinaryCTE", Bool),
                    FieldDef::new("fireCTE", Bool),
                    FieldDef::new("medicalCTE", Bool),
                ],
            ),
            FieldDef::new("auditChecklist", List),
            FieldDef::object(
                "metadata",
                vec![
                    FieldDef::new("createdBy", Text),
                    FieldDef::new("lastModifiedBy", Text),
                    FieldDef::new("clientType", Text),
                    FieldDef::new("status", Text),
                    FieldDef::new("initialAppointmentDate", Timestamp),
                    FieldDef::new("assignedAdminId", Text),
                    FieldDef::new("assignedAdminName", Text),
                    FieldDef::new("createdAt", Timestamp).optional(),
                ],
            ),
            FieldDef::new("createdAt", Timestamp).optional(),
            FieldDef::new("updatedAt", Timestamp).optional(),
        ],
    )
}

/// Individual service plan.
pub fn isp() -> RecordSchema {
    schema(
        "isp",
        "isps",
        vec![
            FieldDef::new("clientId", Text),
            FieldDef::new("ispDate", Timestamp),
            FieldDef::new("jobDeveloper", Text),
            FieldDef::new("acknowledgmentInitialed", Bool),
            FieldDef::new("shortTermGoals", Text),
            FieldDef::new("longTermGoals", Text),
            FieldDef::new("identifiedBarriers", List),
            FieldDef::object(
                "careerPlanning",
                vec![
                    FieldDef::new("workshopsAssigned", Text),
                    FieldDef::new("enrolledInCteOrCollege", Bool),
                ],
            ),
            FieldDef::new("planOfAction", List),
            FieldDef::new("supportServices", List),
            FieldDef::new("createdAt", Timestamp).optional(),
            FieldDef::new("updatedAt", Timestamp).optional(),
        ],
    )
}

/// Staff follow-up task.
pub fn task() -> RecordSchema {
    schema(
        "task",
        "tasks",
        vec![
            FieldDef::new("clientId", Text),
            FieldDef::new("clientName", Text),
            FieldDef::new("assignedToId", Text),
            FieldDef::new("assignedToName", Text),
            FieldDef::new("createdBy", Text),
            FieldDef::new("dueDate", Timestamp),
            FieldDef::new("title", Text),
            FieldDef::new("details", Text),
            FieldDef::new("status", Text),
            FieldDef::new("linkTo", Text).optional(),
            FieldDef::new("urgency", Text),
            FieldDef::new("createdAt", Timestamp).optional(),
            FieldDef::new("updatedAt", Timestamp).optional(),
        ],
    )
}

/// Case or contact note written by staff.
pub fn case_note() -> RecordSchema {
    schema(
        "case_note",
        "case_notes",
        vec![
            FieldDef::new("clientId", Text),
            FieldDef::new("staffId", Text),
            FieldDef::new("staffName", Text),
            FieldDef::new("noteDate", Timestamp),
            FieldDef::new("noteType", Text),
            FieldDef::new("urgency", Text),
            FieldDef::new("serviceType", Text),
            FieldDef::new("contactMethod", Text),
            FieldDef::new("durationMinutes", Number),
            FieldDef::new("noteBody", Text),
            FieldDef::new("attachments", List),
            FieldDef::new("createdAt", Timestamp).optional(),
            FieldDef::new("updatedAt", Timestamp).optional(),
        ],
    )
}

/// Workshop enrollment.
pub fn workshop() -> RecordSchema {
    schema(
        "workshop",
        "workshops",
        vec![
            FieldDef::new("clientId", Text),
            FieldDef::new("workshopDate", Timestamp),
            FieldDef::new("workshopName", Text),
            FieldDef::new("workshopNameOther", Text).optional(),
            FieldDef::new("status", Text),
            FieldDef::new("assignedToId", Text),
            FieldDef::new("assignedToName", Text),
            FieldDef::new("associatedTaskId", Text).optional(),
            FieldDef::new("createdAt", Timestamp).optional(),
            FieldDef::new("updatedAt", Timestamp).optional(),
        ],
    )
}

/// All built-in schemas.
pub fn all() -> Vec<RecordSchema> {
    vec![client(), isp(), task(), case_note(), workshop()]
}

/// Looks up a built-in schema by name (`client`, `isp`, ...).
pub fn by_name(name: &str) -> Option<RecordSchema> {
    all().into_iter().find(|s| s.name == name)
}

/// Looks up the built-in schema stored in a collection.
pub fn for_collection(collection: &str) -> Option<RecordSchema> {
    all().into_iter().find(|s| s.collection == collection)
}
