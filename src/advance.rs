use crate::error::LessonError;
use crate::host::{Confirmer, ContentStore, FolderNode, TabularStore};
use crate::locator::FolderMatch;
use crate::replicate::{replicate, Replica};
use crate::roster::{self, LabelWrite, RowSelection, StudentRecord};
use crate::settings::LessonSettings;
use serde::Serialize;
use tracing::{error, field, info, info_span, warn};

pub const CONFIRM_TITLE: &str = "Confirm Lesson Advancement";

/// Everything resolved before anything is copied or written.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancePlan {
    pub student: StudentRecord,
    pub current_number: u32,
    pub next_number: u32,
    pub next_label: String,
    pub lesson_folder: FolderNode,
    pub student_folder: FolderNode,
    /// Other library folders that also satisfied the naming rules.
    pub other_matches: Vec<FolderMatch>,
}

impl AdvancePlan {
    pub fn confirm_message(&self) -> String {
        format!(
            "Advance \"{}\" from \"{}\" to \"{}\"?\n\nThis will copy the next lesson folder to their drive.",
            self.student.name,
            self.student.lesson_label.trim(),
            self.next_label
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AdvanceOutcome {
    Declined {
        plan: AdvancePlan,
    },
    #[serde(rename_all = "camelCase")]
    Advanced {
        plan: AdvancePlan,
        replica: Replica,
        written: LabelWrite,
    },
}

pub struct LessonContext<'a, T: ?Sized, C: ?Sized> {
    pub sheets: &'a mut T,
    pub storage: &'a mut C,
    pub settings: &'a LessonSettings,
}

/// Resolves the selection to a student, their next lesson number and the
/// library folder for it. Reads only.
pub fn plan<T, C>(ctx: &LessonContext<'_, T, C>, selection: &RowSelection) -> Result<AdvancePlan, LessonError>
where
    T: TabularStore + ?Sized,
    C: ContentStore + ?Sized,
{
    let format = ctx
        .settings
        .format()
        .map_err(|e| LessonError::LookupFailed(format!("lesson marker setting is invalid: {}", e)))?;

    let name = roster::student_name_at(&*ctx.sheets, selection)?;
    let student = roster::find_student(&*ctx.sheets, &name)?;
    if student.folder_id.is_empty() {
        return Err(LessonError::LookupFailed(format!(
            "no folder id found for student \"{}\"",
            student.name
        )));
    }
    if student.lesson_label.trim().is_empty() {
        return Err(LessonError::InputMissing(format!(
            "no current lesson found for student \"{}\"",
            student.name
        )));
    }

    let current_number = format
        .resolve(&student.lesson_label)
        .map_err(|e| LessonError::from_resolve(e, "current lesson"))?;
    let next_number = current_number.checked_add(1).ok_or_else(|| LessonError::Parse {
        raw: student.lesson_label.clone(),
        message: format!("lesson {} has no successor", current_number),
    })?;

    let master_id = ctx.settings.master_folder_id.trim();
    if master_id.is_empty() {
        return Err(LessonError::LookupFailed(
            "master lesson folder is not configured (setup.lessons.masterFolderId)".to_string(),
        ));
    }
    let master = ctx.storage.folder(master_id)?;
    let candidates = ctx.storage.child_folders(&master.id)?;
    let locator = ctx.settings.locator();
    let Some(chosen) = locator.find_next(&candidates, next_number).cloned() else {
        return Err(LessonError::NotFound(format!(
            "next lesson folder for lesson {} not found in master folder \"{}\"",
            next_number, master.name
        )));
    };
    let others: Vec<FolderMatch> = locator
        .matching(&candidates, next_number)
        .into_iter()
        .filter(|m| m.folder.id != chosen.id)
        .collect();
    if !others.is_empty() {
        warn!(
            lesson = next_number,
            chosen = %chosen.name,
            others = others.len(),
            "several library folders match the next lesson; using the first enumerated"
        );
    }

    let student_folder = ctx.storage.folder(&student.folder_id)?;

    Ok(AdvancePlan {
        next_label: format.label(next_number),
        student,
        current_number,
        next_number,
        lesson_folder: chosen,
        student_folder,
        other_matches: others,
    })
}

/// Plans, asks for confirmation, copies the lesson folder into the
/// student's folder and rewrites both tracking records.
///
/// The copy happens before the labels are written; a copy failure leaves
/// whatever was created in place and the labels untouched.
pub fn advance<T, C, K>(
    ctx: &mut LessonContext<'_, T, C>,
    selection: &RowSelection,
    confirmer: &mut K,
) -> Result<AdvanceOutcome, LessonError>
where
    T: TabularStore + ?Sized,
    C: ContentStore + ?Sized,
    K: Confirmer + ?Sized,
{
    let span = info_span!(
        "advance",
        sheet = %selection.sheet,
        row = selection.row,
        student = field::Empty,
        label = field::Empty,
        current = field::Empty,
        next = field::Empty,
    );
    let _entered = span.enter();

    let result = run(ctx, selection, confirmer, &span);
    if let Err(e) = &result {
        error!(code = e.code(), error = %e, "lesson advancement failed");
    }
    result
}

fn run<T, C, K>(
    ctx: &mut LessonContext<'_, T, C>,
    selection: &RowSelection,
    confirmer: &mut K,
    span: &tracing::Span,
) -> Result<AdvanceOutcome, LessonError>
where
    T: TabularStore + ?Sized,
    C: ContentStore + ?Sized,
    K: Confirmer + ?Sized,
{
    let plan = plan(ctx, selection)?;
    span.record("student", plan.student.name.as_str());
    span.record("label", plan.student.lesson_label.as_str());
    span.record("current", plan.current_number);
    span.record("next", plan.next_number);

    if !confirmer.confirm(CONFIRM_TITLE, &plan.confirm_message()) {
        info!("advancement declined");
        return Ok(AdvanceOutcome::Declined { plan });
    }

    let replica = replicate(&mut *ctx.storage, &plan.lesson_folder, &plan.student_folder.id)
        .map_err(|e| {
            warn!(
                destination = %plan.student_folder.id,
                "copy interrupted; the partial folder is left for manual cleanup"
            );
            LessonError::Collaborator(e)
        })?;

    let written = roster::write_lesson_label(&mut *ctx.sheets, &plan.student, &plan.next_label)?;
    info!(
        folder = %replica.root.name,
        folders = replica.folders_created,
        files = replica.files_copied,
        "student advanced to {}",
        plan.next_label
    );
    Ok(AdvanceOutcome::Advanced {
        plan,
        replica,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemorySheets, MemoryStorage};
    use crate::roster::{MAIN_LESSON_COL, MAIN_SHEET, STUDENTS_LESSON_COL, STUDENTS_SHEET};

    struct Fixture {
        sheets: MemorySheets,
        storage: MemoryStorage,
        settings: LessonSettings,
        student_folder: FolderNode,
    }

    fn fixture(label: &str, library: &[&str]) -> Fixture {
        let mut storage = MemoryStorage::new();
        let master = storage.add_root("Master Lessons");
        for name in library {
            let f = storage.add_folder(&master, name);
            storage.add_file(&f, "slides.pdf", name.as_bytes());
            let sub = storage.add_folder(&f, "worksheets");
            storage.add_file(&sub, "ws1.docx", b"ws1");
        }
        let student_folder = storage.add_root("Dana Levi");
        let sheets = MemorySheets::new()
            .with_sheet(
                STUDENTS_SHEET,
                &[
                    &["#", "name", "phone", "folder", "lesson"],
                    &["1", "Dana Levi", "0501", student_folder.id.as_str(), label],
                ],
            )
            .with_sheet(
                MAIN_SHEET,
                &[
                    &["#", "lesson", "name", "last active"],
                    &["1", label, "Dana Levi", ""],
                ],
            );
        let settings = LessonSettings {
            master_folder_id: master.id,
            ..LessonSettings::default()
        };
        Fixture {
            sheets,
            storage,
            settings,
            student_folder,
        }
    }

    fn sel(sheet: &str, row: usize) -> RowSelection {
        RowSelection {
            sheet: sheet.to_string(),
            row,
        }
    }

    fn yes(_: &str, _: &str) -> bool {
        true
    }

    #[test]
    fn end_to_end_advances_one_lesson() {
        let mut fx = fixture("שיעור 3", &["שיעור 4 - Intro", "שיעור 5"]);
        let mut ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };

        let out = advance(&mut ctx, &sel(MAIN_SHEET, 2), &mut yes).expect("advance");

        let AdvanceOutcome::Advanced { plan, replica, written } = out else {
            panic!("expected advancement");
        };
        assert_eq!(plan.current_number, 3);
        assert_eq!(plan.next_number, 4);
        assert_eq!(plan.lesson_folder.name, "שיעור 4 - Intro");
        assert_eq!(replica.root.name, "שיעור 4 - Intro");
        assert_eq!(replica.files_copied, 2);
        assert_eq!(written.main_row, Some(2));
        assert_eq!(fx.sheets.cell(STUDENTS_SHEET, 2, STUDENTS_LESSON_COL), Some("שיעור 4"));
        assert_eq!(fx.sheets.cell(MAIN_SHEET, 2, MAIN_LESSON_COL), Some("שיעור 4"));
        let copied = fx.storage.child_folders(&fx.student_folder.id).expect("children");
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].name, "שיעור 4 - Intro");
    }

    #[test]
    fn lesson_zero_advances_to_one() {
        let mut fx = fixture("שיעור 0", &["שיעור 1"]);
        let mut ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        let out = advance(&mut ctx, &sel(STUDENTS_SHEET, 2), &mut yes).expect("advance");
        assert!(matches!(out, AdvanceOutcome::Advanced { .. }));
        assert_eq!(fx.sheets.cell(STUDENTS_SHEET, 2, STUDENTS_LESSON_COL), Some("שיעור 1"));
    }

    #[test]
    fn declined_confirmation_changes_nothing() {
        let mut fx = fixture("שיעור 3", &["שיעור 4"]);
        let mut asked = Vec::new();
        let mut no = |title: &str, message: &str| {
            asked.push((title.to_string(), message.to_string()));
            false
        };
        let mut ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };

        let out = advance(&mut ctx, &sel(MAIN_SHEET, 2), &mut no).expect("advance");

        assert!(matches!(out, AdvanceOutcome::Declined { .. }));
        assert_eq!(asked.len(), 1);
        assert_eq!(asked[0].0, CONFIRM_TITLE);
        assert!(asked[0].1.contains("\"שיעור 3\" to \"שיעור 4\""));
        assert_eq!(fx.sheets.cell(STUDENTS_SHEET, 2, STUDENTS_LESSON_COL), Some("שיעור 3"));
        assert!(fx.storage.child_folders(&fx.student_folder.id).expect("children").is_empty());
    }

    #[test]
    fn missing_next_folder_is_not_found() {
        let mut fx = fixture("שיעור 3", &["שיעור 5"]);
        let ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        let e = plan(&ctx, &sel(MAIN_SHEET, 2)).expect_err("no folder");
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn blank_label_is_missing_input() {
        let mut fx = fixture("  ", &["שיעור 1"]);
        let ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        let e = plan(&ctx, &sel(MAIN_SHEET, 2)).expect_err("blank");
        assert!(matches!(e, LessonError::InputMissing(_)));
    }

    #[test]
    fn unparseable_label_carries_raw_text() {
        let mut fx = fixture("שיעור -2", &["שיעור 1"]);
        let ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        match plan(&ctx, &sel(MAIN_SHEET, 2)) {
            Err(LessonError::Parse { raw, message }) => {
                assert_eq!(raw, "שיעור -2");
                assert!(message.contains("שיעור -2"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_folder_and_unset_master_are_lookup_failures() {
        let mut fx = fixture("שיעור 1", &["שיעור 2"]);
        fx.settings.master_folder_id = String::new();
        let ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        let e = plan(&ctx, &sel(MAIN_SHEET, 2)).expect_err("unset");
        assert_eq!(e.code(), "lookup_failed");

        let mut fx = fixture("שיעור 1", &["שיעור 2"]);
        fx.settings.master_folder_id = "gone".to_string();
        let ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        let e = plan(&ctx, &sel(MAIN_SHEET, 2)).expect_err("gone");
        assert_eq!(e.code(), "lookup_failed");
    }

    #[test]
    fn ambiguous_library_reports_other_matches() {
        let mut fx = fixture("שיעור 0", &["שיעור 15", "שיעור 1"]);
        let ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        let p = plan(&ctx, &sel(MAIN_SHEET, 2)).expect("plan");
        assert_eq!(p.lesson_folder.name, "שיעור 15");
        assert_eq!(p.other_matches.len(), 1);
        assert_eq!(p.other_matches[0].folder.name, "שיעור 1");

        fx.settings.strict_folder_match = true;
        let ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };
        let p = plan(&ctx, &sel(MAIN_SHEET, 2)).expect("plan");
        assert_eq!(p.lesson_folder.name, "שיעור 1");
        assert!(p.other_matches.is_empty());
    }

    #[test]
    fn copy_failure_keeps_labels_and_partial_tree() {
        let mut fx = fixture("שיעור 3", &["שיעור 4"]);
        fx.storage.fail_after = Some(1);
        let mut ctx = LessonContext {
            sheets: &mut fx.sheets,
            storage: &mut fx.storage,
            settings: &fx.settings,
        };

        let e = advance(&mut ctx, &sel(MAIN_SHEET, 2), &mut yes).expect_err("fails");

        assert_eq!(e.code(), "collaborator_failure");
        assert_eq!(fx.sheets.cell(STUDENTS_SHEET, 2, STUDENTS_LESSON_COL), Some("שיעור 3"));
        assert_eq!(fx.storage.child_folders(&fx.student_folder.id).expect("children").len(), 1);
    }
}
