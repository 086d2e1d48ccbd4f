// SPDX-License-Identifier: MPL-2.0

//! Widget module organization

pub mod display;
pub mod icons;
pub mod layout;
pub mod pointer;
pub mod refresh;
pub mod renderer;
pub mod weather;

pub use display::DisplayModel;
pub use icons::IconResolver;
pub use refresh::RefreshController;
pub use weather::QWeatherClient;
