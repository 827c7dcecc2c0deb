//! Suggestion list state machine.
//!
//! The dropdown under the search box shows quick actions while the query is
//! empty and live predictions otherwise. Both kinds live in a single tagged
//! list, so navigation never has to translate indices between two arrays.
//!
//! ```rust
//! use place_heatmap::{default_quick_actions, ListState, SuggestionList};
//!
//! let mut list = SuggestionList::new(default_quick_actions());
//! list.focus();
//! assert_eq!(list.state(), ListState::ShowingQuickActions);
//!
//! list.previous();
//! assert_eq!(list.selected(), Some(list.len() - 1));
//! ```

use serde::{Deserialize, Serialize};

use crate::provider::{CategoryFilter, Prediction};

/// What a quick action does when activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuickActionEffect {
    /// Ask the host for the device location.
    UseMyLocation,
    /// Replace the query with canned text.
    SetQuery(String),
}

/// A static entry shown while the query is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub id: String,
    pub label: String,
    pub description: String,
    pub category_hint: Option<CategoryFilter>,
    pub effect: QuickActionEffect,
}

impl QuickAction {
    fn category(id: &str, label: &str, description: &str, types: &[&str], query: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            category_hint: Some(CategoryFilter::new(types.iter().copied())),
            effect: QuickActionEffect::SetQuery(query.to_string()),
        }
    }
}

/// The stock quick actions: device location plus five category searches.
pub fn default_quick_actions() -> Vec<QuickAction> {
    vec![
        QuickAction {
            id: "use-location".into(),
            label: "Use my location".into(),
            description: "Current position".into(),
            category_hint: None,
            effect: QuickActionEffect::UseMyLocation,
        },
        QuickAction::category("restaurants", "Find restaurants", "Nearby dining", &["restaurant"], "restaurants near me"),
        QuickAction::category("universities", "Find universities", "Education", &["university"], "universities near me"),
        QuickAction::category("shopping", "Find shopping", "Retail stores", &["shopping_mall"], "shopping malls near me"),
        QuickAction::category("hospitals", "Find hospitals", "Healthcare", &["hospital"], "hospitals near me"),
        QuickAction::category("gas-stations", "Find gas stations", "Fuel stations", &["gas_station"], "gas stations near me"),
    ]
}

/// One row of the dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuggestionItem {
    QuickAction(QuickAction),
    Prediction(Prediction),
}

impl SuggestionItem {
    pub fn label(&self) -> &str {
        match self {
            Self::QuickAction(action) => &action.label,
            Self::Prediction(prediction) => &prediction.primary_text,
        }
    }
}

/// What the dropdown is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListState {
    Closed,
    ShowingQuickActions,
    ShowingPredictions,
}

/// The item the user activated.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    QuickAction(QuickAction),
    Prediction(Prediction),
}

/// Dropdown state machine with circular keyboard navigation.
///
/// State is derived from three inputs: focus, whether the query is empty,
/// and the current predictions. The selection is `None` or an index into the
/// visible items.
#[derive(Debug, Clone)]
pub struct SuggestionList {
    quick_actions: Vec<QuickAction>,
    predictions: Vec<Prediction>,
    items: Vec<SuggestionItem>,
    focused: bool,
    query_empty: bool,
    selected: Option<usize>,
}

impl SuggestionList {
    pub fn new(quick_actions: Vec<QuickAction>) -> Self {
        let mut list = Self {
            quick_actions,
            predictions: Vec::new(),
            items: Vec::new(),
            focused: false,
            query_empty: true,
            selected: None,
        };
        list.rebuild();
        list
    }

    pub fn state(&self) -> ListState {
        if !self.focused {
            ListState::Closed
        } else if self.query_empty {
            ListState::ShowingQuickActions
        } else if !self.predictions.is_empty() {
            ListState::ShowingPredictions
        } else {
            ListState::Closed
        }
    }

    /// Items currently visible, in display order.
    pub fn items(&self) -> &[SuggestionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&SuggestionItem> {
        self.selected.and_then(|i| self.items.get(i))
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus(&mut self) {
        self.focused = true;
        self.selected = None;
        self.rebuild();
    }

    /// Close the list. Called once the blur grace delay has elapsed.
    pub fn blur(&mut self) {
        self.close();
    }

    pub fn escape(&mut self) {
        self.close();
    }

    pub fn close(&mut self) {
        self.focused = false;
        self.selected = None;
        self.rebuild();
    }

    /// The query text changed.
    pub fn set_query(&mut self, query: &str) {
        self.query_empty = query.is_empty();
        self.selected = None;
        self.rebuild();
    }

    /// Fresh predictions arrived; a selection past the new end is reset to none.
    pub fn set_predictions(&mut self, predictions: &[Prediction]) {
        self.predictions = predictions.to_vec();
        self.rebuild();
    }

    /// Move the selection down, wrapping from the last item to the first.
    pub fn next(&mut self) {
        let total = self.items.len();
        if total == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) if i + 1 < total => i + 1,
            _ => 0,
        });
    }

    /// Move the selection up, wrapping from the first item (or none) to the last.
    pub fn previous(&mut self) {
        let total = self.items.len();
        if total == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) if i > 0 => i - 1,
            _ => total - 1,
        });
    }

    /// Activate the selected item. No-op without a selection.
    pub fn activate(&mut self) -> Option<Activation> {
        let index = self.selected?;
        self.activate_at(index)
    }

    /// Activate the item at `index` (pointer click).
    ///
    /// Quick actions close the list; predictions leave it open until their
    /// details resolve.
    pub fn activate_at(&mut self, index: usize) -> Option<Activation> {
        let activation = match (self.state(), self.items.get(index)?) {
            (ListState::ShowingQuickActions, SuggestionItem::QuickAction(action)) => {
                Activation::QuickAction(action.clone())
            }
            (ListState::ShowingPredictions, SuggestionItem::Prediction(prediction)) => {
                Activation::Prediction(prediction.clone())
            }
            _ => return None,
        };

        if matches!(activation, Activation::QuickAction(_)) {
            self.close();
        }
        Some(activation)
    }

    fn rebuild(&mut self) {
        self.items = match self.state() {
            ListState::Closed => Vec::new(),
            ListState::ShowingQuickActions => self
                .quick_actions
                .iter()
                .cloned()
                .map(SuggestionItem::QuickAction)
                .collect(),
            ListState::ShowingPredictions => self
                .predictions
                .iter()
                .cloned()
                .map(SuggestionItem::Prediction)
                .collect(),
        };

        if self.selected.is_some_and(|i| i >= self.items.len()) {
            self.selected = None;
        }
    }
}
