pub mod helpers;

mod composites;
mod objects;
mod rich_data;
mod scalars;
