pub mod form_inputs;
