pub mod price_window;
