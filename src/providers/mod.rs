pub mod eastmoney;
pub mod resolver;
pub mod util;
pub mod yahoo_finance;

pub use eastmoney::EastmoneyProvider;
pub use resolver::{Resolved, SeriesSource, SymbolResolver};
pub use yahoo_finance::YahooFinanceProvider;
