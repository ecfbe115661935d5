use crate::domain::cart::{Cart, CartLine};
use crate::error::CartReadError;
use std::io::Read;

/// Reads cart lines from CSV with the header `item_id,title,price,quantity`.
///
/// Whitespace around fields is trimmed. Prices are whole currency units.
pub struct CartReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CartReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes each record.
    pub fn lines(self) -> impl Iterator<Item = Result<CartLine, CartReadError>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CartReadError::from))
    }

    /// Collects every record into a cart. Repeated item ids are merged.
    pub fn into_cart(self) -> Result<Cart, CartReadError> {
        let mut cart = Cart::new();
        for line in self.lines() {
            cart.add(line?)?;
        }
        Ok(cart)
    }
}
