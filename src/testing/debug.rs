//! Debug helpers for inspecting rows mid-pipeline.

use crate::pipeline::Pipeline;
use crate::row::Row;
use tracing::debug;

impl Pipeline {
    /// Log each row passing this point at `debug` level, tagged with `label`.
    ///
    /// ```
    /// use rowflow::*;
    ///
    /// # fn main() -> rowflow::Result<()> {
    /// let stats = from_rows(vec![row! { "id" => 1 }])
    ///     .debug_inspect("after source")
    ///     .go()?;
    /// assert_eq!(stats.loaded(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn debug_inspect(self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.add_step(format!("inspect({label})"), move |row: Row| {
            debug!(label = %label, row = ?row, "inspect");
            Ok(row)
        })
    }
}
