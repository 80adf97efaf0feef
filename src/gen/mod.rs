pub mod lesson;

use std::fmt::Write;

use itertools::Itertools;

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum GenerationError {
    #[error("{}", .0)]
    Fmt(std::fmt::Error),
    #[error("{}", .0)]
    Io(std::io::Error),
    #[error("Bad lesson spec: {}", .0)]
    Spec(toml::de::Error),
    #[error("Lesson has no title")]
    #[from(ignore)]
    NoTitle,
    #[error("Frame `{frame}` has chart width {width} outside of (0, 1]")]
    #[from(ignore)]
    InvalidWidth { frame: String, width: f32 },
    #[error("Default chart width {} is outside of (0, 1]", .0)]
    #[from(ignore)]
    InvalidDefaultWidth(f32),
}

pub type Res = Result<(), GenerationError>;

pub trait OutputGenerator<Item: ?Sized, Context> {
    fn write_to<W: Write + ?Sized>(
        &self,
        output: &mut W,
        context: &mut Context,
        item: &Item,
    ) -> Res;

    fn write_all_to<'i, W: Write + ?Sized, I>(
        &self,
        output: &mut W,
        context: &mut Context,
        items: I,
    ) -> Res
    where
        I: IntoIterator<Item = &'i Item>,
        Item: 'i,
    {
        items
            .into_iter()
            .map(|item| self.write_to(output, context, item))
            .try_collect()
    }
}
