mod flows;
mod helpers;
mod webhook;
