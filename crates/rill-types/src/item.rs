use crate::locator::Locator;

/// A record value paired with the backend locator it was read from.
///
/// Created per change event and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreItem<T> {
    locator: Locator,
    value: T,
}

impl<T> StoreItem<T> {
    pub fn new(locator: Locator, value: T) -> Self {
        Self { locator, value }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn into_parts(self) -> (Locator, T) {
        (self.locator, self.value)
    }
}
