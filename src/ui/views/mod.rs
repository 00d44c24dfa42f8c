mod products;

pub use products::ProductListView;
