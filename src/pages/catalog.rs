//! Catalogue list screens
//!
//! Brands, product types, options, option sets and products are all the same
//! ng2-smart-table screen with different filters and columns, so one page
//! object drives all of them from a constant [`ScreenDescriptor`].

use std::fmt;
use std::str::FromStr;
use tokio::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::locator::Locator;
use crate::pages::base::BasePage;
use crate::session::ElementHandle;
use crate::sorting::{ColumnKind, SortOrder};
use crate::{Error, Result};

/// Data rows of the smart table
pub const TABLE_ROWS: Locator = Locator::css("ng2-smart-table tbody tr");
/// Cells, relative to a row
pub const TABLE_CELLS: Locator = Locator::tag("td");
/// Shown instead of rows when nothing matches
pub const NO_DATA_MESSAGE: Locator = Locator::css(".ng2-smart-no-data-message");
/// Row edit icons
pub const UPDATE_BUTTONS: Locator = Locator::css("i.nb-edit");
/// Row delete icons
pub const DELETE_BUTTONS: Locator = Locator::css("i.nb-trash");
/// Row toggles
pub const ROW_CHECKBOX: Locator = Locator::css("input[type='checkbox']");
/// Toasts raised after row actions
pub const NOTIFICATION: Locator = Locator::css(".toast, .alert, .notification");
/// "Showing x to y of z" counter
pub const PAGINATION_INFO: Locator = Locator::css(".page-counts");
/// "Create" button above the table
pub const CREATE_BUTTON: Locator = Locator::css("a.createBtn");

/// Budget for the "no data" banner and notifications
pub const BANNER_BUDGET: Duration = Duration::from_secs(3);

/// Header clicks needed at most to reach any sort state
const MAX_SORT_CLICKS: usize = 3;

/// What a table cell holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Plain text
    Text,
    /// Edit and delete icons
    Actions,
    /// Toggle checkbox
    Checkbox,
}

/// One table column
#[derive(Debug)]
pub struct Column {
    /// Column name used by callers
    pub name: &'static str,
    /// Cell content
    pub cell: CellKind,
    /// How values compare when sorted
    pub kind: ColumnKind,
    /// Sortable header link
    pub header: Option<Locator>,
}

/// Filter input bound to a column
#[derive(Debug)]
pub struct FilterField {
    /// Filter name used by callers
    pub name: &'static str,
    /// Input locator
    pub input: Locator,
    /// Column the filter narrows
    pub column: &'static str,
}

/// Constant description of one list screen
#[derive(Debug)]
pub struct ScreenDescriptor {
    /// Human readable name
    pub title: &'static str,
    /// Hash route below the application root
    pub route: &'static str,
    /// Filter inputs in the table header
    pub filters: &'static [FilterField],
    /// Columns, in display order
    pub columns: &'static [Column],
}

impl ScreenDescriptor {
    /// Column by name
    pub fn column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns.iter().enumerate().find(|(_, c)| c.name == name)
    }

    /// Filter by name
    pub fn filter(&self, name: &str) -> Option<&FilterField> {
        self.filters.iter().find(|f| f.name == name)
    }

    /// First text column with a sortable header
    pub fn first_sortable_text_column(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.header.is_some() && c.cell == CellKind::Text && c.kind == ColumnKind::Text)
    }
}

const fn text(name: &'static str, header: &'static str) -> Column {
    Column {
        name,
        cell: CellKind::Text,
        kind: ColumnKind::Text,
        header: Some(Locator::css(header)),
    }
}

const fn numeric(name: &'static str, header: &'static str) -> Column {
    Column {
        name,
        cell: CellKind::Text,
        kind: ColumnKind::Numeric,
        header: Some(Locator::css(header)),
    }
}

const ACTIONS: Column = Column {
    name: "actions",
    cell: CellKind::Actions,
    kind: ColumnKind::Text,
    header: None,
};

const fn filter(name: &'static str, input: &'static str, column: &'static str) -> FilterField {
    FilterField {
        name,
        input: Locator::css(input),
        column,
    }
}

static BRANDS: ScreenDescriptor = ScreenDescriptor {
    title: "Brands",
    route: "/#/pages/catalogue/brands/brands-list",
    filters: &[
        filter("brand_name", "input[placeholder='Brand name']", "brand_name"),
        filter("code", "input[placeholder='Code']", "code"),
    ],
    columns: &[
        numeric("id", "th.ng2-smart-th.id a"),
        text("brand_name", "th.ng2-smart-th.description a"),
        text("code", "th.ng2-smart-th.code a"),
        ACTIONS,
    ],
};

static PRODUCT_TYPES: ScreenDescriptor = ScreenDescriptor {
    title: "Product types",
    route: "/#/pages/catalogue/types/types-list",
    filters: &[
        filter("code", "input[placeholder='Code']", "code"),
        filter("merchant_store", "input[placeholder='Merchant store']", "merchant_store"),
    ],
    columns: &[
        numeric("id", "th.ng2-smart-th.id a"),
        text("merchant_store", "th.ng2-smart-th.store a"),
        text("code", "th.ng2-smart-th.code a"),
        ACTIONS,
    ],
};

static OPTIONS: ScreenDescriptor = ScreenDescriptor {
    title: "Product options",
    route: "/#/pages/catalogue/options/options-list",
    filters: &[filter("name", "input[placeholder='Name']", "name")],
    columns: &[
        numeric("id", "th.ng2-smart-th.id a"),
        text("name", "th.ng2-smart-th.descriptions a"),
        text("type", "th.ng2-smart-th.type a"),
        ACTIONS,
    ],
};

static OPTION_SETS: ScreenDescriptor = ScreenDescriptor {
    title: "Option sets",
    route: "/#/pages/catalogue/options/options-set-list",
    filters: &[],
    columns: &[
        numeric("id", "th.ng2-smart-th.id a"),
        text("code", "th.ng2-smart-th.code a"),
        text("option_name", "th.ng2-smart-th.option a"),
        text("option_value", "th.ng2-smart-th.values a"),
        text("product_types", "th.ng2-smart-th.productTypes a"),
        ACTIONS,
    ],
};

static PRODUCTS: ScreenDescriptor = ScreenDescriptor {
    title: "Products",
    route: "/#/pages/catalogue/products/products-list",
    filters: &[
        filter("sku", "input[placeholder='Sku']", "sku"),
        filter("product_name", "input[placeholder='Product name']", "product_name"),
    ],
    columns: &[
        numeric("id", "th.ng2-smart-th.id a"),
        text("sku", "th.ng2-smart-th.sku a"),
        text("product_name", "th.ng2-smart-th.name a"),
        numeric("qty", "th.ng2-smart-th.quantity a"),
        Column {
            name: "available",
            cell: CellKind::Checkbox,
            kind: ColumnKind::Text,
            header: Some(Locator::css("th.ng2-smart-th.available a")),
        },
        numeric("price", "th.ng2-smart-th.price a"),
        text("created", "th.ng2-smart-th.creationDate a"),
    ],
};

/// Catalogue list screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogScreen {
    /// Brands list
    Brands,
    /// Product types list
    ProductTypes,
    /// Product options list
    Options,
    /// Option sets list
    OptionSets,
    /// Products list
    Products,
}

impl CatalogScreen {
    /// Every screen
    pub const ALL: [CatalogScreen; 5] = [
        CatalogScreen::Brands,
        CatalogScreen::ProductTypes,
        CatalogScreen::Options,
        CatalogScreen::OptionSets,
        CatalogScreen::Products,
    ];

    /// Layout of the screen
    pub fn descriptor(&self) -> &'static ScreenDescriptor {
        match self {
            CatalogScreen::Brands => &BRANDS,
            CatalogScreen::ProductTypes => &PRODUCT_TYPES,
            CatalogScreen::Options => &OPTIONS,
            CatalogScreen::OptionSets => &OPTION_SETS,
            CatalogScreen::Products => &PRODUCTS,
        }
    }

    /// Short identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogScreen::Brands => "brands",
            CatalogScreen::ProductTypes => "product_types",
            CatalogScreen::Options => "options",
            CatalogScreen::OptionSets => "option_sets",
            CatalogScreen::Products => "products",
        }
    }
}

impl fmt::Display for CatalogScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogScreen {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CatalogScreen::ALL
            .into_iter()
            .find(|screen| screen.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| Error::configuration(format!("Unknown catalogue screen: {}", s)))
    }
}

/// Snapshot of one table row, read fresh from the DOM
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRow {
    values: Vec<(&'static str, String)>,
    has_actions: bool,
    toggled: bool,
}

impl TableRow {
    /// Row from column values
    pub fn new(values: Vec<(&'static str, String)>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    /// Value of `column`
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Column values in display order
    pub fn values(&self) -> &[(&'static str, String)] {
        &self.values
    }

    /// Edit and delete icons are both present
    pub fn has_actions(&self) -> bool {
        self.has_actions
    }

    /// The row's checkbox is checked
    pub fn toggled(&self) -> bool {
        self.toggled
    }
}

/// Page object for one catalogue list screen
#[derive(Debug, Clone)]
pub struct CatalogPage {
    base: BasePage,
    screen: CatalogScreen,
    url: String,
}

impl CatalogPage {
    /// Page for `screen` under the configured application root
    pub fn new(base: BasePage, config: &Config, screen: CatalogScreen) -> Self {
        Self {
            url: config.route(screen.descriptor().route),
            base,
            screen,
        }
    }

    /// Element layer
    pub fn base(&self) -> &BasePage {
        &self.base
    }

    /// Screen this page drives
    pub fn screen(&self) -> CatalogScreen {
        self.screen
    }

    /// Screen layout
    pub fn descriptor(&self) -> &'static ScreenDescriptor {
        self.screen.descriptor()
    }

    /// Absolute URL of the screen
    pub fn url(&self) -> &str {
        &self.url
    }

    fn load_markers(&self) -> Vec<Locator> {
        let descriptor = self.descriptor();
        let mut markers: Vec<Locator> = descriptor.filters.iter().map(|f| f.input.clone()).collect();
        markers.extend(descriptor.columns.iter().filter_map(|c| c.header.clone()));
        markers.push(CREATE_BUTTON);
        markers.push(TABLE_ROWS);
        markers
    }

    fn filter_field(&self, name: &str) -> Result<&'static FilterField> {
        self.descriptor().filter(name).ok_or_else(|| {
            Error::configuration(format!("{} has no filter named {}", self.descriptor().title, name))
        })
    }

    fn column(&self, name: &str) -> Result<(usize, &'static Column)> {
        self.descriptor().column(name).ok_or_else(|| {
            Error::configuration(format!("{} has no column named {}", self.descriptor().title, name))
        })
    }

    /// Navigate to the screen and wait for it to render
    #[instrument(skip(self), fields(screen = %self.screen))]
    pub async fn open(&self) -> Result<bool> {
        self.base.navigate(&self.url).await?;
        self.wait_for_page_load().await
    }

    /// Wait for any filter, header or row, then let the table settle
    pub async fn wait_for_page_load(&self) -> Result<bool> {
        let markers = self.load_markers();
        let session = self.base.session();
        let markers = &markers;
        let loaded = self
            .base
            .wait()
            .until_true(|| async move {
                for marker in markers {
                    if !session.query(marker, None).await?.is_empty() {
                        return Ok(true);
                    }
                }
                Ok(false)
            })
            .await?;

        if loaded {
            self.base.settle().await;
            info!("{} page loaded", self.descriptor().title);
        } else {
            warn!("{} page did not load within {:?}", self.descriptor().title, self.base.timeout());
        }
        Ok(loaded)
    }

    /// Whether the screen is currently shown
    pub async fn is_loaded(&self) -> Result<bool> {
        let url = self.base.current_url().await?;
        Ok(url.contains(self.descriptor().route.trim_start_matches('/')))
    }

    /// Type into a filter and wait for the table to re-render
    pub async fn enter_filter(&self, name: &str, text: &str) -> Result<bool> {
        let field = self.filter_field(name)?;
        let typed = self.base.type_text(&field.input, text).await?;
        if typed {
            self.base.settle().await;
        }
        Ok(typed)
    }

    /// Empty a filter
    pub async fn clear_filter(&self, name: &str) -> Result<bool> {
        self.enter_filter(name, "").await
    }

    /// Empty every filter; `true` when all were cleared
    pub async fn clear_all_filters(&self) -> Result<bool> {
        let mut all = true;
        for field in self.descriptor().filters {
            all &= self.clear_filter(field.name).await?;
        }
        Ok(all)
    }

    /// Current content of a filter
    pub async fn filter_value(&self, name: &str) -> Result<String> {
        let field = self.filter_field(name)?;
        self.base.value(&field.input).await
    }

    /// Fresh snapshot of every data row.
    ///
    /// A row that re-renders mid-read restarts the read.
    pub async fn rows(&self) -> Result<Vec<TableRow>> {
        let columns = self.descriptor().columns;
        let session = self.base.session();
        let rows = self
            .base
            .wait()
            .until(|| async move {
                let mut rows = Vec::new();
                for row in session.query(&TABLE_ROWS, None).await? {
                    if let Some(snapshot) = read_row(session.as_ref(), &row, columns).await? {
                        rows.push(snapshot);
                    }
                }
                Ok(Some(rows))
            })
            .await?;

        Ok(rows.unwrap_or_else(|| {
            warn!("Table kept re-rendering while being read");
            Vec::new()
        }))
    }

    /// Number of data rows
    pub async fn row_count(&self) -> Result<usize> {
        Ok(self.rows().await?.len())
    }

    /// Whether the table shows no data
    pub async fn is_table_empty(&self) -> Result<bool> {
        if self.base.capped(BANNER_BUDGET).is_visible(&NO_DATA_MESSAGE).await? {
            return Ok(true);
        }
        Ok(self.rows().await?.is_empty())
    }

    /// Values of one column, top to bottom
    pub async fn column_values(&self, column: &str) -> Result<Vec<String>> {
        self.column(column)?;
        Ok(self
            .rows()
            .await?
            .iter()
            .filter_map(|row| row.get(column).map(str::to_string))
            .collect())
    }

    /// Whether any row's `column` contains `needle`, ignoring case
    pub async fn contains_text(&self, column: &str, needle: &str) -> Result<bool> {
        let needle = needle.to_lowercase();
        Ok(self
            .column_values(column)
            .await?
            .iter()
            .any(|value| value.to_lowercase().contains(&needle)))
    }

    /// Sort state shown by a column header
    pub async fn sort_order(&self, column: &str) -> Result<SortOrder> {
        let header = self.sort_header(column)?;
        let class = self
            .base
            .capped(BANNER_BUDGET)
            .attribute(header, "class")
            .await?
            .unwrap_or_default();
        Ok(SortOrder::from_class(&class))
    }

    fn sort_header(&self, column: &str) -> Result<&'static Locator> {
        let (_, definition) = self.column(column)?;
        definition.header.as_ref().ok_or_else(|| {
            Error::configuration(format!("Column {} of {} is not sortable", column, self.descriptor().title))
        })
    }

    /// Click a column header until it shows `order`
    #[instrument(skip(self))]
    pub async fn sort_by(&self, column: &str, order: SortOrder) -> Result<bool> {
        let header = self.sort_header(column)?;

        for _ in 0..MAX_SORT_CLICKS {
            if self.sort_order(column).await? == order {
                return Ok(true);
            }
            if !self.base.click(header).await? {
                return Ok(false);
            }
            self.base.settle().await;
        }

        let reached = self.sort_order(column).await? == order;
        if !reached {
            warn!("Column {} never reached {} order", column, order.as_str());
        }
        Ok(reached)
    }

    /// Click the edit icon of row `index`
    pub async fn click_update(&self, index: usize) -> Result<bool> {
        self.base.click_nth(&UPDATE_BUTTONS, index).await
    }

    /// Click the delete icon of row `index`
    pub async fn click_delete(&self, index: usize) -> Result<bool> {
        self.base.click_nth(&DELETE_BUTTONS, index).await
    }

    /// Click the checkbox of row `index`
    pub async fn toggle_row(&self, index: usize) -> Result<bool> {
        self.base.click_nth(&ROW_CHECKBOX, index).await
    }

    /// Whether a notification toast is shown
    pub async fn is_notification_displayed(&self) -> Result<bool> {
        self.base.capped(BANNER_BUDGET).is_visible(&NOTIFICATION).await
    }

    /// Whether the "create" button above the table is shown
    pub async fn is_create_visible(&self) -> Result<bool> {
        self.base.capped(BANNER_BUDGET).is_visible(&CREATE_BUTTON).await
    }

    /// Click the "create" button above the table
    pub async fn click_create(&self) -> Result<bool> {
        self.base.click(&CREATE_BUTTON).await
    }

    /// Pagination counter text, empty when there is none
    pub async fn pagination_info(&self) -> Result<String> {
        self.base.capped(BANNER_BUDGET).read_text(&PAGINATION_INFO).await
    }

    /// Reload the screen, which resets filters and sorting
    pub async fn refresh(&self) -> Result<bool> {
        self.base.refresh().await?;
        self.wait_for_page_load().await
    }
}

/// Read one row; rows with fewer cells than columns are banners, not data
async fn read_row(
    session: &dyn crate::session::BrowserSession,
    row: &ElementHandle,
    columns: &'static [Column],
) -> Result<Option<TableRow>> {
    let cells = session.query(&TABLE_CELLS, Some(row)).await?;
    if cells.len() < columns.len() {
        debug!("Skipping row with {} cells", cells.len());
        return Ok(None);
    }

    let mut snapshot = TableRow::default();
    for (column, cell) in columns.iter().zip(&cells) {
        match column.cell {
            CellKind::Text => {
                let value = session.text(cell).await?;
                snapshot.values.push((column.name, value.trim().to_string()));
            }
            CellKind::Actions => {
                let edit = session.query(&UPDATE_BUTTONS, Some(cell)).await?;
                let trash = session.query(&DELETE_BUTTONS, Some(cell)).await?;
                snapshot.has_actions = !edit.is_empty() && !trash.is_empty();
            }
            CellKind::Checkbox => {
                let checked = match session.query(&ROW_CHECKBOX, Some(cell)).await?.first() {
                    Some(checkbox) => session.property(checkbox, "checked").await?,
                    None => None,
                };
                snapshot.toggled = checked.as_deref() == Some("true");
                snapshot.values.push((column.name, snapshot.toggled.to_string()));
            }
        }
    }
    Ok(Some(snapshot))
}
