//! Duplicate elimination over sorted groups.

use tracing::{Level, instrument};

use crate::{Error, channel::Channel, protocol::Context, tags::TagAllocator, view::View};

impl View {
    /// Keeps one row per distinct combination of values in `fields`.
    ///
    /// Without `fields`, all data fields except bucket tags are compared. Which of the equal
    /// rows survives is unspecified. Invalid rows never count as duplicates of valid ones, so
    /// the view should be compacted first.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    pub async fn distinct<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        fields: &[&str],
    ) -> Result<View, Error> {
        let all: Vec<String>;
        let fields: Vec<&str> = if fields.is_empty() {
            all = self
                .data_fields()
                .iter()
                .filter(|f| !f.is_bucket_tag())
                .map(|f| f.name.clone())
                .collect();
            all.iter().map(String::as_str).collect()
        } else {
            fields.to_vec()
        };
        let (mut view, heads) = self.group_by(ctx, tags, &fields).await?;
        if view.row_num() == 0 {
            return Ok(view);
        }
        let valid = ctx.and(tags, view.valid(), &heads).await?;
        view.set_valid(valid)?;
        view.clear_invalid_entries(ctx, tags).await
    }
}
