pub mod card_entry;
pub mod card_face;
pub mod collection;
pub mod image_locator;
pub mod lookup_card;
pub mod variant;
