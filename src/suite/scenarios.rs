//! Scenario bodies
//!
//! Each body drives page objects on an already authenticated session and
//! turns a failed check into [`Error::Assertion`]. Filter scenarios run
//! against every filter of the screen, clearing all of them in between.

use tracing::{debug, info};

use crate::bootstrap::AuthenticatedSession;
use crate::pages::catalog::{Column, FilterField};
use crate::pages::login::is_auth_url;
use crate::pages::{CatalogPage, CatalogScreen, CellKind};
use crate::sorting::{is_reverse_of, is_sorted, SortOrder};
use crate::suite::{
    Scenario, ScenarioKind, LARGE_INPUT_LEN, MARKUP_PAYLOADS, NON_EXISTENT_TERM, RESET_TERM,
    SPECIAL_CHARACTERS, SQL_PAYLOADS,
};
use crate::{Error, Result};

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::assertion(message()))
    }
}

/// Run the body of `scenario` on `session`
pub async fn execute(scenario: &Scenario, session: &AuthenticatedSession) -> Result<()> {
    let Some(screen) = scenario.screen else {
        return match scenario.kind {
            ScenarioKind::LoginReachesHome => login_reaches_home(session).await,
            other => Err(Error::configuration(format!("{:?} needs a catalogue screen", other))),
        };
    };

    let page = session.catalog_page(screen);
    ensure(page.open().await?, || format!("{} page did not load", page.descriptor().title))?;

    match scenario.kind {
        ScenarioKind::LoginReachesHome => login_reaches_home(session).await,
        ScenarioKind::PageLoads => page_loads(&page).await,
        ScenarioKind::EmptyFilterShowsRows => empty_filter_shows_rows(&page).await,
        ScenarioKind::NonExistentFilterShowsNoRows => non_existent_filter_shows_no_rows(&page).await,
        ScenarioKind::LargeInputAccepted => large_input_accepted(&page).await,
        ScenarioKind::ScriptPayloadDoesNotExecute => payloads_handled_safely(&page, &MARKUP_PAYLOADS).await,
        ScenarioKind::SqlPayloadHandledSafely => payloads_handled_safely(&page, &SQL_PAYLOADS).await,
        ScenarioKind::SortAscendingThenDescending => sort_ascending_then_descending(&page).await,
        ScenarioKind::SpecialCharactersAccepted => special_characters_accepted(&page).await,
        ScenarioKind::LeadingTrailingSpaces => leading_trailing_spaces(&page).await,
        ScenarioKind::ValidSearchNarrowsRows => valid_search_narrows_rows(&page).await,
        ScenarioKind::SortBackToDefault => sort_back_to_default(&page).await,
        ScenarioKind::SortWithFilterApplied => sort_with_filter_applied(&page).await,
        ScenarioKind::FilterWithSortApplied => filter_with_sort_applied(&page).await,
        ScenarioKind::PageReset => page_reset(&page).await,
        ScenarioKind::CreateButtonVisible => create_button_visible(&page).await,
        ScenarioKind::ActionButtonsPresent => action_buttons_present(&page).await,
        ScenarioKind::AvailabilityToggle => availability_toggle(&page).await,
    }
}

fn filters(page: &CatalogPage) -> Result<&'static [FilterField]> {
    let descriptor = page.descriptor();
    if descriptor.filters.is_empty() {
        return Err(Error::configuration(format!("{} has no filters", descriptor.title)));
    }
    Ok(descriptor.filters)
}

fn sortable_column(page: &CatalogPage) -> Result<&'static Column> {
    page.descriptor().first_sortable_text_column().ok_or_else(|| {
        Error::configuration(format!("{} has no sortable text column", page.descriptor().title))
    })
}

/// Filter narrowing `column`, else the first one
fn filter_for(page: &CatalogPage, column: &Column) -> Result<&'static FilterField> {
    let filters = filters(page)?;
    Ok(filters
        .iter()
        .find(|f| f.column == column.name)
        .unwrap_or(&filters[0]))
}

async fn enter(page: &CatalogPage, filter: &str, text: &str) -> Result<()> {
    ensure(page.enter_filter(filter, text).await?, || format!("Filter {} not accepted", filter))
}

async fn clear_all(page: &CatalogPage) -> Result<()> {
    ensure(page.clear_all_filters().await?, || {
        format!("Filters of {} could not be cleared", page.screen())
    })
}

async fn still_loaded(page: &CatalogPage) -> Result<()> {
    ensure(page.is_loaded().await?, || format!("{} navigated away", page.screen()))
}

/// First character of the first non-empty value in `column`
async fn term_from(page: &CatalogPage, column: &str) -> Result<String> {
    let term = page
        .column_values(column)
        .await?
        .into_iter()
        .find_map(|value| value.trim().chars().next())
        .map(String::from);
    term.ok_or_else(|| Error::assertion(format!("{} has no {} value to search for", page.screen(), column)))
}

async fn login_reaches_home(session: &AuthenticatedSession) -> Result<()> {
    let url = session.base_page().current_url().await?;
    ensure(!is_auth_url(&url), || format!("Still on the login screen at {}", url))?;
    info!("Session landed on {} ({:?})", url, session.report().readiness);
    Ok(())
}

async fn page_loads(page: &CatalogPage) -> Result<()> {
    ensure(page.is_loaded().await?, || {
        format!("{} route is not the current URL", page.descriptor().title)
    })?;
    let rows = page.row_count().await?;
    debug!("{} shows {} rows", page.screen(), rows);
    Ok(())
}

async fn empty_filter_shows_rows(page: &CatalogPage) -> Result<()> {
    let baseline = page.row_count().await?;

    for field in filters(page)? {
        enter(page, field.name, "").await?;
        clear_all(page).await?;
        let rows = page.row_count().await?;
        ensure(rows > 0, || format!("{} lists no rows with every filter empty", page.screen()))?;
        ensure(rows == baseline, || {
            format!("Empty {} filter changed rows from {} to {}", field.name, baseline, rows)
        })?;
    }
    Ok(())
}

async fn non_existent_filter_shows_no_rows(page: &CatalogPage) -> Result<()> {
    for field in filters(page)? {
        clear_all(page).await?;
        enter(page, field.name, NON_EXISTENT_TERM).await?;
        ensure(page.is_table_empty().await?, || {
            format!("{} still lists rows for {} in {}", page.screen(), NON_EXISTENT_TERM, field.name)
        })?;
    }
    Ok(())
}

async fn large_input_accepted(page: &CatalogPage) -> Result<()> {
    let input = "A".repeat(LARGE_INPUT_LEN);
    page.base().take_dialogs().await?;

    for field in filters(page)? {
        clear_all(page).await?;
        enter(page, field.name, &input).await?;

        let value = page.filter_value(field.name).await?;
        ensure(!value.is_empty(), || format!("Filter {} dropped the long value", field.name))?;
        ensure(page.is_table_empty().await?, || {
            format!("{} still lists rows for a {} character {} filter", page.screen(), LARGE_INPUT_LEN, field.name)
        })?;

        let dialogs = page.base().take_dialogs().await?;
        ensure(dialogs.is_empty(), || format!("Long input raised dialogs: {:?}", dialogs))?;
        still_loaded(page).await?;
    }
    Ok(())
}

/// Every payload must either sit verbatim in the filter or empty the table,
/// and none may open a dialog
async fn payloads_handled_safely(page: &CatalogPage, payloads: &[&str]) -> Result<()> {
    // Dialogs left over from loading must not count against a payload.
    page.base().take_dialogs().await?;

    for field in filters(page)? {
        for &payload in payloads {
            clear_all(page).await?;
            enter(page, field.name, payload).await?;

            let dialogs = page.base().take_dialogs().await?;
            ensure(dialogs.is_empty(), || {
                format!("Payload {:?} in {} raised dialogs: {:?}", payload, field.name, dialogs)
            })?;

            let value = page.filter_value(field.name).await?;
            let handled = value.contains(payload) || page.is_table_empty().await?;
            ensure(handled, || {
                format!("Payload {:?} in {} was altered to {:?} and rows remain", payload, field.name, value)
            })?;
            still_loaded(page).await?;
        }
    }
    Ok(())
}

async fn sort_ascending_then_descending(page: &CatalogPage) -> Result<()> {
    let column = sortable_column(page)?;

    ensure(page.sort_by(column.name, SortOrder::Ascending).await?, || {
        format!("Column {} never showed asc order", column.name)
    })?;
    let ascending = page.column_values(column.name).await?;
    ensure(is_sorted(&ascending, SortOrder::Ascending, column.kind), || {
        format!("Column {} is not asc: {:?}", column.name, ascending)
    })?;

    ensure(page.sort_by(column.name, SortOrder::Descending).await?, || {
        format!("Column {} never showed desc order", column.name)
    })?;
    let descending = page.column_values(column.name).await?;
    ensure(is_sorted(&descending, SortOrder::Descending, column.kind), || {
        format!("Column {} is not desc: {:?}", column.name, descending)
    })?;
    ensure(is_reverse_of(&descending, &ascending, column.kind), || {
        format!(
            "Column {} desc {:?} does not mirror asc {:?}",
            column.name, descending, ascending
        )
    })
}

async fn sort_back_to_default(page: &CatalogPage) -> Result<()> {
    let columns = page
        .descriptor()
        .columns
        .iter()
        .filter(|c| c.header.is_some() && c.cell == CellKind::Text);

    for column in columns {
        ensure(page.sort_by(column.name, SortOrder::Ascending).await?, || {
            format!("Column {} never showed asc order", column.name)
        })?;
        ensure(page.sort_by(column.name, SortOrder::Unsorted).await?, || {
            format!("Column {} kept its sort", column.name)
        })?;
        let order = page.sort_order(column.name).await?;
        ensure(order == SortOrder::Unsorted, || {
            format!("Column {} shows {} instead of no sort", column.name, order.as_str())
        })?;
    }
    Ok(())
}

async fn special_characters_accepted(page: &CatalogPage) -> Result<()> {
    page.base().take_dialogs().await?;

    for field in filters(page)? {
        clear_all(page).await?;
        enter(page, field.name, SPECIAL_CHARACTERS).await?;

        let value = page.filter_value(field.name).await?;
        ensure(value == SPECIAL_CHARACTERS, || {
            format!("Filter {} holds {:?} instead of the typed text", field.name, value)
        })?;
        let dialogs = page.base().take_dialogs().await?;
        ensure(dialogs.is_empty(), || format!("Special characters raised dialogs: {:?}", dialogs))?;
        still_loaded(page).await?;
    }
    Ok(())
}

async fn leading_trailing_spaces(page: &CatalogPage) -> Result<()> {
    let baseline = page.row_count().await?;

    for field in filters(page)? {
        clear_all(page).await?;
        let term: String = page
            .column_values(field.column)
            .await?
            .into_iter()
            .find(|value| !value.trim().is_empty())
            .map(|value| value.trim().chars().take(3).collect())
            .unwrap_or_else(|| RESET_TERM.to_string());

        enter(page, field.name, &format!("  {}  ", term)).await?;
        still_loaded(page).await?;
        let rows = page.row_count().await?;
        ensure(rows <= baseline, || {
            format!("Padded {} filter grew the table from {} to {} rows", field.name, baseline, rows)
        })?;
    }
    Ok(())
}

async fn valid_search_narrows_rows(page: &CatalogPage) -> Result<()> {
    for field in filters(page)? {
        clear_all(page).await?;
        let term = term_from(page, field.column).await?;
        enter(page, field.name, &term).await?;

        let values = page.column_values(field.column).await?;
        ensure(!values.is_empty(), || {
            format!("Existing term {:?} in {} emptied the table", term, field.name)
        })?;
        ensure(page.contains_text(field.column, &term).await?, || {
            format!("No {} value contains {:?}", field.column, term)
        })?;
        let needle = term.to_lowercase();
        let stray: Vec<&String> = values
            .iter()
            .filter(|value| !value.to_lowercase().contains(&needle))
            .collect();
        ensure(stray.is_empty(), || {
            format!("Filter {}={:?} kept non-matching rows {:?}", field.name, term, stray)
        })?;
    }
    Ok(())
}

async fn sort_with_filter_applied(page: &CatalogPage) -> Result<()> {
    let column = sortable_column(page)?;
    let field = filter_for(page, column)?;

    let term = term_from(page, field.column).await?;
    enter(page, field.name, &term).await?;
    ensure(page.sort_by(column.name, SortOrder::Ascending).await?, || {
        format!("Column {} never showed asc order", column.name)
    })?;

    let values = page.column_values(column.name).await?;
    ensure(!values.is_empty(), || format!("Filter {}={:?} left no rows", field.name, term))?;
    ensure(is_sorted(&values, SortOrder::Ascending, column.kind), || {
        format!("Filtered column {} is not asc: {:?}", column.name, values)
    })?;

    let kept = page.filter_value(field.name).await?;
    ensure(kept == term, || format!("Sorting replaced filter {:?} with {:?}", term, kept))
}

async fn filter_with_sort_applied(page: &CatalogPage) -> Result<()> {
    let column = sortable_column(page)?;
    let field = filter_for(page, column)?;

    ensure(page.sort_by(column.name, SortOrder::Descending).await?, || {
        format!("Column {} never showed desc order", column.name)
    })?;
    let term = term_from(page, field.column).await?;
    enter(page, field.name, &term).await?;

    let order = page.sort_order(column.name).await?;
    ensure(order == SortOrder::Descending, || {
        format!("Filtering reset column {} to {}", column.name, order.as_str())
    })?;
    ensure(page.contains_text(field.column, &term).await?, || {
        format!("No {} value contains {:?} after filtering", field.column, term)
    })?;

    let values = page.column_values(column.name).await?;
    ensure(is_sorted(&values, SortOrder::Descending, column.kind), || {
        format!("Column {} lost its desc order: {:?}", column.name, values)
    })
}

async fn page_reset(page: &CatalogPage) -> Result<()> {
    let descriptor = page.descriptor();
    let column = descriptor.first_sortable_text_column();

    for field in descriptor.filters {
        enter(page, field.name, RESET_TERM).await?;
        let value = page.filter_value(field.name).await?;
        ensure(value == RESET_TERM, || format!("Filter {} holds {:?}", field.name, value))?;
    }
    if let Some(column) = column {
        ensure(page.sort_by(column.name, SortOrder::Ascending).await?, || {
            format!("Column {} never showed asc order", column.name)
        })?;
    }

    ensure(page.refresh().await?, || format!("{} did not reload", descriptor.title))?;

    for field in descriptor.filters {
        let value = page.filter_value(field.name).await?;
        ensure(value.is_empty(), || {
            format!("Filter {} still holds {:?} after reload", field.name, value)
        })?;
    }
    if let Some(column) = column {
        let order = page.sort_order(column.name).await?;
        ensure(order == SortOrder::Unsorted, || {
            format!("Column {} still sorted {} after reload", column.name, order.as_str())
        })?;
    }
    let rows = page.row_count().await?;
    ensure(rows > 0, || format!("{} lists no rows after reload", descriptor.title))
}

async fn create_button_visible(page: &CatalogPage) -> Result<()> {
    ensure(page.is_create_visible().await?, || {
        format!("{} shows no create button", page.descriptor().title)
    })
}

async fn action_buttons_present(page: &CatalogPage) -> Result<()> {
    let rows = page.rows().await?;
    ensure(!rows.is_empty(), || format!("{} lists no rows", page.screen()))?;
    let missing: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !row.has_actions())
        .map(|(i, _)| i)
        .collect();
    ensure(missing.is_empty(), || format!("Rows {:?} lack edit or delete icons", missing))
}

async fn first_row_toggled(page: &CatalogPage) -> Result<bool> {
    page.rows()
        .await?
        .first()
        .map(|row| row.toggled())
        .ok_or_else(|| Error::assertion(format!("{} lists no rows", page.screen())))
}

async fn availability_toggle(page: &CatalogPage) -> Result<()> {
    let before = first_row_toggled(page).await?;
    ensure(page.toggle_row(0).await?, || "First row has no checkbox".to_string())?;
    let flipped = first_row_toggled(page).await?;
    ensure(flipped != before, || format!("Checkbox stayed {} after a click", before))?;

    ensure(page.toggle_row(0).await?, || "First row lost its checkbox".to_string())?;
    let restored = first_row_toggled(page).await?;
    ensure(restored == before, || format!("Checkbox did not return to {}", before))
}

/// Screens a scenario kind can run on
pub fn screens_for(kind: ScenarioKind) -> Vec<CatalogScreen> {
    CatalogScreen::ALL
        .into_iter()
        .filter(|screen| {
            let descriptor = screen.descriptor();
            let has_cell = |cell: CellKind| descriptor.columns.iter().any(|c| c.cell == cell);
            match kind {
                ScenarioKind::LoginReachesHome => false,
                ScenarioKind::ActionButtonsPresent => has_cell(CellKind::Actions),
                ScenarioKind::AvailabilityToggle => has_cell(CellKind::Checkbox),
                kind => {
                    (!kind.needs_filter() || !descriptor.filters.is_empty())
                        && (!kind.needs_sortable_column() || descriptor.first_sortable_text_column().is_some())
                }
            }
        })
        .collect()
}
